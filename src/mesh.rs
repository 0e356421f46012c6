//! The `Mesh` output type (spec.md §3 `Tessellation` entity) and the small
//! helpers the distributed driver needs to walk it: node/cell incidence,
//! cell compaction ("deleteCells" in the original), and orientation
//! decoding for the signed face references.

use std::collections::HashSet;

use crate::geometry::{point_at, point_count, Dim};
use glam::DVec3;

/// A face reference as stored inside a cell's face list: the low bits are
/// the face index, the sign encodes orientation. We use one's-complement
/// (`!idx`) rather than plain negation so that face `0` still round-trips
/// through the "reversed" encoding.
pub fn encode_face_ref(face: u32, reversed: bool) -> i64 {
    if reversed {
        !(face as i64)
    } else {
        face as i64
    }
}

pub fn decode_face_ref(r: i64) -> (u32, bool) {
    if r < 0 {
        (!r as u32, true)
    } else {
        (r as u32, false)
    }
}

/// Output mesh of a (possibly distributed) tessellation.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub dim: Option<Dim>,
    /// Flat, `dim`-strided node coordinates.
    pub nodes: Vec<f64>,
    /// Each face: an ordered node-index sequence.
    pub faces: Vec<Vec<u32>>,
    /// Each cell: an ordered, signed face-reference list (see
    /// [`encode_face_ref`]).
    pub cells: Vec<Vec<i64>>,
    /// Face -> incident cell indices (signed, same convention), length 1 for
    /// boundary faces and 2 for interior faces.
    pub face_cells: Vec<Vec<i64>>,
    pub inf_nodes: Vec<bool>,
    pub inf_faces: Vec<bool>,
    /// Peer ranks this mesh shares an interface with, parallel to
    /// `shared_nodes` / `shared_faces`.
    pub neighbor_domains: Vec<u32>,
    pub shared_nodes: Vec<Vec<u32>>,
    pub shared_faces: Vec<Vec<u32>>,
}

impl Mesh {
    pub fn node_count(&self) -> usize {
        match self.dim {
            Some(d) => point_count(d, &self.nodes),
            None => 0,
        }
    }

    pub fn node_point(&self, i: usize) -> DVec3 {
        point_at(self.dim.expect("mesh has no dimension set"), &self.nodes, i)
    }

    /// For every node, the set of cells touching it (via the node's
    /// incident faces). Computed on demand; callers cache as needed.
    pub fn compute_node_cells(&self) -> Vec<HashSet<u32>> {
        let mut node_cells: Vec<HashSet<u32>> = vec![HashSet::new(); self.node_count()];
        for (icell, face_refs) in self.cells.iter().enumerate() {
            for &fr in face_refs {
                let (iface, _) = decode_face_ref(fr);
                for &inode in &self.faces[iface as usize] {
                    node_cells[inode as usize].insert(icell as u32);
                }
            }
        }
        node_cells
    }

    /// For every cell, the set of node indices on its boundary.
    pub fn compute_cell_to_nodes(&self) -> Vec<HashSet<u32>> {
        self.cells
            .iter()
            .map(|face_refs| {
                let mut nodes = HashSet::new();
                for &fr in face_refs {
                    let (iface, _) = decode_face_ref(fr);
                    nodes.extend(self.faces[iface as usize].iter().copied());
                }
                nodes
            })
            .collect()
    }

    /// Remove cells whose mask entry is `false`, renumbering faces, nodes
    /// and incidence in the process. Mirrors `deleteCells` in the original:
    /// everything downstream (face lists, node lists, `face_cells`) is
    /// compacted to refer only to what survives. Returns the old->new
    /// remap tables for faces and nodes (`u32::MAX` for anything dropped)
    /// so a caller that computed indices against the pre-trim mesh (shared
    /// node/face identification runs before the trim -- see
    /// `crate::distributed::shared_elements`) can translate them.
    pub fn delete_cells(&mut self, keep: &[bool]) -> (Vec<u32>, Vec<u32>) {
        assert_eq!(keep.len(), self.cells.len());

        // Which faces survive: any face touched by a kept cell.
        let mut face_keep = vec![false; self.faces.len()];
        for (icell, face_refs) in self.cells.iter().enumerate() {
            if keep[icell] {
                for &fr in face_refs {
                    let (iface, _) = decode_face_ref(fr);
                    face_keep[iface as usize] = true;
                }
            }
        }

        let mut face_remap = vec![u32::MAX; self.faces.len()];
        let mut new_faces = Vec::new();
        let mut new_inf_faces = Vec::new();
        let mut new_face_cells = Vec::new();
        for (iface, keep_face) in face_keep.iter().enumerate() {
            if *keep_face {
                face_remap[iface] = new_faces.len() as u32;
                new_faces.push(self.faces[iface].clone());
                new_inf_faces.push(self.inf_faces.get(iface).copied().unwrap_or(false));
                new_face_cells.push(self.face_cells[iface].clone());
            }
        }

        // Which nodes survive: any node referenced by a surviving face.
        let mut node_keep = vec![false; self.node_count()];
        for f in &new_faces {
            for &inode in f {
                node_keep[inode as usize] = true;
            }
        }
        let mut node_remap = vec![u32::MAX; self.node_count()];
        let dim = self.dim.expect("mesh has no dimension set");
        let mut new_nodes = Vec::new();
        let mut new_inf_nodes = Vec::new();
        let mut next_node = 0u32;
        for inode in 0..self.node_count() {
            if node_keep[inode] {
                node_remap[inode] = next_node;
                next_node += 1;
                let p = point_at(dim, &self.nodes, inode);
                crate::geometry::push_point(dim, &mut new_nodes, p);
                new_inf_nodes.push(self.inf_nodes.get(inode).copied().unwrap_or(false));
            }
        }

        for f in new_faces.iter_mut() {
            for inode in f.iter_mut() {
                *inode = node_remap[*inode as usize];
            }
        }

        // Remap cell indices embedded in face_cells.
        let mut cell_remap = vec![i64::MAX; self.cells.len()];
        let mut next_cell = 0i64;
        let mut new_cells = Vec::new();
        for (icell, face_refs) in self.cells.iter().enumerate() {
            if keep[icell] {
                cell_remap[icell] = next_cell;
                next_cell += 1;
                let remapped = face_refs
                    .iter()
                    .map(|&fr| {
                        let (iface, rev) = decode_face_ref(fr);
                        encode_face_ref(face_remap[iface as usize], rev)
                    })
                    .collect();
                new_cells.push(remapped);
            }
        }
        // A face whose partner cell was trimmed away becomes a boundary
        // reference; mark such entries with a sentinel distinct from any
        // valid encoded reference (rather than leaving the stale pre-remap
        // index, which could coincidentally alias a *different* surviving
        // cell once indices are renumbered) and drop them below.
        const DROPPED: i64 = i64::MIN;
        for fc in new_face_cells.iter_mut() {
            for c in fc.iter_mut() {
                let (icell, rev) = decode_face_ref(*c);
                let remapped = cell_remap[icell as usize];
                *c = if remapped != i64::MAX {
                    encode_face_ref(remapped as u32, rev)
                } else {
                    DROPPED
                };
            }
        }
        for fc in new_face_cells.iter_mut() {
            fc.retain(|&c| c != DROPPED);
        }

        self.nodes = new_nodes;
        self.inf_nodes = new_inf_nodes;
        self.faces = new_faces;
        self.inf_faces = new_inf_faces;
        self.face_cells = new_face_cells;
        self.cells = new_cells;

        (face_remap, node_remap)
    }
}
