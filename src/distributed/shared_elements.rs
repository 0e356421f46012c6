//! Shared node/face identification (spec.md §4.3) and deterministic
//! cross-domain ordering (spec.md §4.4).
//!
//! Both of these walk the *untrimmed* mesh (ghost cells still present) --
//! `gen_to_domain[jcell]` is only meaningful before `overtessellate::trim`
//! renumbers or deletes those cells.

use std::collections::HashSet;

use glam::DVec3;

use crate::geometry::BoundingBox;
use crate::mesh::{decode_face_ref, Mesh};
use crate::quantize::{quantize_with_bbox, LatticeQuantizer, TaggedKey};

#[derive(Default)]
pub struct SharedElements {
    /// Parallel to the eventual `neighbor_domains`: shared node indices
    /// (into the untrimmed mesh's node array, which is unaffected by the
    /// cell trim) per peer.
    pub shared_nodes: Vec<Vec<u32>>,
    pub shared_faces: Vec<Vec<u32>>,
}

/// spec.md §4.3. `neighbor_domains` gives the peer order the two parallel
/// output vectors are indexed by.
pub fn identify(
    mesh: &Mesh,
    gen_to_domain: &[u32],
    neighbor_domains: &[u32],
    n_local: usize,
    self_rank: u32,
) -> SharedElements {
    let peer_index: std::collections::HashMap<u32, usize> =
        neighbor_domains.iter().enumerate().map(|(i, &p)| (p, i)).collect();
    let peer_owner = |cell: u32| -> Option<usize> {
        let owner = gen_to_domain.get(cell as usize).copied().unwrap_or(self_rank);
        if owner == self_rank {
            return None;
        }
        peer_index.get(&owner).copied()
    };

    // nodeCells[n]: the set of cells touching node n, over the whole
    // (untrimmed) mesh -- needed below to find nodes only ever shared at a
    // corner, with no shared face of their own.
    let node_cells = mesh.compute_node_cells();

    let mut shared_faces: Vec<Vec<u32>> = vec![Vec::new(); neighbor_domains.len()];
    let mut shared_node_sets: Vec<HashSet<u32>> = vec![HashSet::new(); neighbor_domains.len()];

    for icell in 0..n_local {
        for &fr in &mesh.cells[icell] {
            let (iface, _) = decode_face_ref(fr);

            // A face with two incident cells where the partner is owned by
            // peer p is a shared face with p.
            for &other in &mesh.face_cells[iface as usize] {
                let (jcell, _) = decode_face_ref(other);
                if jcell as usize == icell {
                    continue;
                }
                if let Some(pi) = peer_owner(jcell) {
                    shared_faces[pi].push(iface);
                }
            }

            // A node is shared with p if any cell touching it (not just
            // the face it happens to sit on) is owned by p -- this also
            // catches nodes shared only at a corner, with no face of their
            // own incident to a peer cell.
            for &inode in &mesh.faces[iface as usize] {
                for &jcell in &node_cells[inode as usize] {
                    if jcell as usize == icell {
                        continue;
                    }
                    if let Some(pi) = peer_owner(jcell) {
                        shared_node_sets[pi].insert(inode);
                    }
                }
            }
        }
    }

    for faces in shared_faces.iter_mut() {
        faces.sort_unstable();
        faces.dedup();
    }

    let shared_nodes = shared_node_sets
        .into_iter()
        .map(|set| {
            let mut v: Vec<u32> = set.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect();

    SharedElements {
        shared_nodes,
        shared_faces,
    }
}

/// spec.md §4.4: sort shared nodes/faces by quantized lattice position so
/// both sides of a peer pair land on the same order without communicating.
pub fn order_deterministically<Q: LatticeQuantizer>(
    mesh: &Mesh,
    bbox: &BoundingBox,
    degeneracy: f64,
    quantizer: &Q,
    neighbor_domains: &[u32],
    shared: &mut SharedElements,
) {
    for p in 0..neighbor_domains.len() {
        let mut keyed: Vec<TaggedKey> = shared.shared_nodes[p]
            .iter()
            .map(|&n| quantize_with_bbox(quantizer, bbox, degeneracy, mesh.node_point(n as usize), n))
            .collect();
        keyed.sort_unstable();
        shared.shared_nodes[p] = keyed.into_iter().map(|k| k.tag).collect();

        let mut keyed_faces: Vec<TaggedKey> = shared.shared_faces[p]
            .iter()
            .map(|&f| {
                let centroid = face_centroid(mesh, f);
                quantize_with_bbox(quantizer, bbox, degeneracy, centroid, f)
            })
            .collect();
        keyed_faces.sort_unstable();
        shared.shared_faces[p] = keyed_faces.into_iter().map(|k| k.tag).collect();
    }
}

/// Translate shared node/face indices computed against the pre-trim mesh
/// through the remap tables `Mesh::delete_cells` produced, dropping
/// anything the trim removed (it shouldn't: every shared element touches a
/// kept, local cell by construction of `identify`, so this is a sanity
/// filter, not an expected code path).
pub fn remap(shared: &mut SharedElements, face_remap: &[u32], node_remap: &[u32]) {
    for faces in shared.shared_faces.iter_mut() {
        faces.retain_mut(|f| {
            let new = face_remap[*f as usize];
            *f = new;
            new != u32::MAX
        });
    }
    for nodes in shared.shared_nodes.iter_mut() {
        nodes.retain_mut(|n| {
            let new = node_remap[*n as usize];
            *n = new;
            new != u32::MAX
        });
    }
}

/// Average of a face's node coordinates in 2D; for 3D this is an adequate
/// stand-in for an area-weighted centroid for ordering purposes, since any
/// point strictly inside the (planar, convex) face polygon quantizes to the
/// same or an adjacent lattice cell as the true area-weighted centroid --
/// the lattice spacing is the serial kernel's own degeneracy, finer than
/// the difference between the two.
fn face_centroid(mesh: &Mesh, face: u32) -> DVec3 {
    let nodes = &mesh.faces[face as usize];
    let sum: DVec3 = nodes.iter().map(|&n| mesh.node_point(n as usize)).sum();
    sum / nodes.len() as f64
}
