//! Ghost-generator exchange (spec.md §4.1): neighbor discovery without
//! global communication, then the actual generator exchange.

use glam::DVec3;
use log::trace;

use crate::comm::Communicator;
use crate::error::Result;
use crate::geometry::{point_at, point_count, push_point, Dim, Mode, Plc};
use crate::hull::{convex_intersect, convex_within, hull_dimension, ConvexHull, ConvexHullBuilder};
use crate::mesh::decode_face_ref;
use crate::tessellator::SerialTessellator;
use crate::wire;

const TAG_GEN_SIZE: u32 = 1;
const TAG_GEN_PAYLOAD: u32 = 2;

pub struct GhostExchangeResult {
    pub generators_extended: Vec<f64>,
    pub gen_to_domain: Vec<u32>,
    pub neighbor_domains: Vec<u32>,
}

pub fn exchange<C: Communicator, H: ConvexHullBuilder, T: SerialTessellator>(
    comm: &C,
    hull_builder: &H,
    serial: &T,
    dim: Dim,
    points: &[f64],
    mode: Mode<'_>,
) -> Result<GhostExchangeResult> {
    let rank = comm.rank();
    let size = comm.size();
    let tol = serial.degeneracy();

    let local_hull = augment_hull_with_exterior_generators(hull_builder, serial, dim, points, mode, tol)?;

    let domain_hulls = broadcast_hulls(comm, dim, &local_hull)?;

    let mut hull_points = Vec::new();
    let mut offset = vec![0u32; size as usize + 1];
    for (r, hull) in domain_hulls.iter().enumerate() {
        hull_points.extend_from_slice(&hull.points);
        offset[r + 1] = offset[r] + hull.vertex_count() as u32;
    }
    // The hull mesh is always run without PLC holes (spec.md §4.1 step 3:
    // "the hull mesh is only used for neighbor discovery").
    let outer_only_plc;
    let hull_mode = match mode {
        Mode::Plc { plc_points, plc } => {
            outer_only_plc = Plc::outer_only(plc.facets.clone());
            Mode::Plc {
                plc_points,
                plc: &outer_only_plc,
            }
        }
        other => other,
    };
    let hull_mesh = serial.tessellate(dim, &hull_points, hull_mode)?;

    let mut neighbors = discover_neighbors(rank, size, &domain_hulls, &hull_mesh, &offset, tol);
    neighbors.sort_unstable();
    neighbors.dedup();

    debug_assert_symmetric_neighbors(comm, rank, size, &neighbors)?;

    let result = exchange_generators(comm, dim, points, &neighbors)?;
    Ok(GhostExchangeResult {
        generators_extended: result.0,
        gen_to_domain: result.1,
        neighbor_domains: neighbors,
    })
}

/// spec.md §4.1 step 1. Picks the `convexWithin`-cell-vs-hull strategy
/// (the `#if true` branch in the original) as the sole exterior-cell
/// detection mechanism; see `DESIGN.md` for why.
fn augment_hull_with_exterior_generators<H: ConvexHullBuilder, T: SerialTessellator>(
    hull_builder: &H,
    serial: &T,
    dim: Dim,
    points: &[f64],
    mode: Mode<'_>,
    tol: f64,
) -> Result<ConvexHull> {
    if point_count(dim, points) == 0 {
        return Ok(ConvexHull {
            dim,
            points: Vec::new(),
            hull_dimension: 0,
        });
    }
    let hull = hull_builder.convex_hull(dim, points);
    if hull.hull_dimension < dim.size() {
        // Lower-dimensional hull: every local generator is visible.
        return Ok(ConvexHull {
            dim,
            points: points.to_vec(),
            hull_dimension: hull.hull_dimension,
        });
    }

    let local_mesh = serial.tessellate(dim, points, mode)?;
    let mut augmented = hull.points.clone();
    for (icell, face_refs) in local_mesh.cells.iter().enumerate() {
        let mut cell_nodes = Vec::new();
        for &fr in face_refs {
            let (iface, _) = decode_face_ref(fr);
            cell_nodes.extend(local_mesh.faces[iface as usize].iter().copied());
        }
        let cell_pts: Vec<DVec3> = cell_nodes
            .iter()
            .map(|&n| local_mesh.node_point(n as usize))
            .collect();
        if !convex_within(&cell_pts, &hull, tol) {
            trace!("cell {icell} is exterior, adding its generator to the hull point set");
            push_point(dim, &mut augmented, point_at(dim, points, icell));
        }
    }
    let dimension = hull_dimension(
        dim,
        &(0..point_count(dim, &augmented)).map(|i| point_at(dim, &augmented, i)).collect::<Vec<_>>(),
        tol,
    );
    Ok(ConvexHull {
        dim,
        points: augmented,
        hull_dimension: dimension,
    })
}

/// spec.md §4.1 step 2: round-robin of broadcasts rooted at every rank, in
/// strict rank order so every rank enters the same Pth collective call.
fn broadcast_hulls<C: Communicator>(comm: &C, dim: Dim, local_hull: &ConvexHull) -> Result<Vec<ConvexHull>> {
    let size = comm.size();
    let rank = comm.rank();
    let mut out = Vec::with_capacity(size as usize);
    for root in 0..size {
        let mut buf = if rank == root {
            wire::serialize_hull(&local_hull.points, local_hull.hull_dimension as u32)
        } else {
            Vec::new()
        };
        comm.broadcast_bytes(root, &mut buf)?;
        let (points, hull_dimension) = wire::deserialize_hull(&buf)?;
        out.push(ConvexHull {
            dim,
            points,
            hull_dimension: hull_dimension as usize,
        });
    }
    Ok(out)
}

fn discover_neighbors(
    rank: u32,
    size: u32,
    domain_hulls: &[ConvexHull],
    hull_mesh: &crate::mesh::Mesh,
    offset: &[u32],
    tol: f64,
) -> Vec<u32> {
    let mut neighbors = Vec::new();

    for s in 0..size {
        if s == rank {
            continue;
        }
        if convex_intersect(&domain_hulls[rank as usize], &domain_hulls[s as usize], tol) {
            neighbors.push(s);
        }
    }

    let node_cells = hull_mesh.compute_node_cells();
    let own_range = offset[rank as usize]..offset[rank as usize + 1];
    for icell in own_range {
        let Some(face_refs) = hull_mesh.cells.get(icell as usize) else {
            continue;
        };
        for &fr in face_refs {
            let (iface, _) = decode_face_ref(fr);
            for &inode in &hull_mesh.faces[iface as usize] {
                for &jcell in &node_cells[inode as usize] {
                    if jcell == icell {
                        continue;
                    }
                    let owner = owner_of_cell(jcell, offset);
                    if owner != rank {
                        neighbors.push(owner);
                    }
                }
            }
        }
    }

    neighbors
}

/// Binary search on `offset` to map a hull-mesh cell index back to its
/// owning rank (spec.md §4.1 step 4).
fn owner_of_cell(cell: u32, offset: &[u32]) -> u32 {
    match offset.binary_search(&cell) {
        Ok(idx) => idx as u32,
        Err(idx) => (idx - 1) as u32,
    }
}

fn debug_assert_symmetric_neighbors<C: Communicator>(
    comm: &C,
    rank: u32,
    size: u32,
    neighbors: &[u32],
) -> Result<()> {
    if !cfg!(debug_assertions) {
        return Ok(());
    }
    for root in 0..size {
        let mut buf = if rank == root {
            wire::serialize_u32_list(neighbors)
        } else {
            Vec::new()
        };
        comm.broadcast_bytes(root, &mut buf)?;
        if root == rank {
            continue;
        }
        let root_neighbors = wire::deserialize_u32_list(&buf)?;
        let root_has_me = root_neighbors.contains(&rank);
        let i_have_root = neighbors.contains(&root);
        if root_has_me != i_have_root {
            log::warn!(
                "neighbor symmetry violated between rank {rank} and rank {root}: {rank}->{root}={i_have_root}, {root}->{rank}={root_has_me}"
            );
        }
    }
    Ok(())
}

/// spec.md §4.1 step 6.
fn exchange_generators<C: Communicator>(
    comm: &C,
    dim: Dim,
    points: &[f64],
    neighbors: &[u32],
) -> Result<(Vec<f64>, Vec<u32>)> {
    // `serialize_points` always writes at least its own length prefix, so
    // an empty generator set does not serialize to an empty buffer -- the
    // "skip when empty" test has to be on the generator count, not on the
    // serialized byte length.
    let is_empty = point_count(dim, points) == 0;
    let own_payload = wire::serialize_points(points);
    let mut send_handles = Vec::new();
    for &p in neighbors {
        let declared_size: u32 = if is_empty { 0 } else { own_payload.len() as u32 };
        send_handles.push(comm.isend_bytes(p, TAG_GEN_SIZE, declared_size.to_le_bytes().to_vec()));
        if !is_empty {
            send_handles.push(comm.isend_bytes(p, TAG_GEN_PAYLOAD, own_payload.clone()));
        }
    }

    let mut generators_extended = points.to_vec();
    let mut gen_to_domain = vec![comm.rank(); point_count(dim, points)];
    for &p in neighbors {
        let size_bytes = comm.recv_bytes(p, TAG_GEN_SIZE)?;
        let n_bytes = u32::from_le_bytes(size_bytes.as_slice().try_into().map_err(|_| {
            crate::error::DistributedTessellationError::invalid_input("malformed generator size prefix")
        })?);
        if n_bytes == 0 {
            continue;
        }
        let payload = comm.recv_bytes(p, TAG_GEN_PAYLOAD)?;
        let ghost_points = wire::deserialize_points(&payload)?;
        let n_ghosts = point_count(dim, &ghost_points);
        generators_extended.extend_from_slice(&ghost_points);
        gen_to_domain.extend(std::iter::repeat(p).take(n_ghosts));
    }

    for handle in send_handles {
        handle.wait()?;
    }

    Ok((generators_extended, gen_to_domain))
}
