//! Shared-node coordinate reconciliation (spec.md §4.5) and empty-neighbor
//! pruning (spec.md §4.6).

use crate::comm::Communicator;
use crate::error::{DistributedTessellationError, Result};
use crate::geometry::{point_at, push_point};
use crate::mesh::Mesh;
use crate::wire;

const TAG_RECONCILE_SIZE: u32 = 9;
const TAG_RECONCILE_PAYLOAD: u32 = 10;

pub fn reconcile<C: Communicator>(comm: &C, mesh: &mut Mesh) -> Result<()> {
    let self_rank = comm.rank();
    let dim = match mesh.dim {
        Some(d) => d,
        None => return Ok(()),
    };

    let owner = owner_map(mesh, self_rank);

    let mut send_handles = Vec::new();
    // Per peer, the node indices we expect to receive new coordinates for,
    // in the order the payload will arrive.
    let mut recv_targets: Vec<Vec<u32>> = vec![Vec::new(); mesh.neighbor_domains.len()];

    for (pi, &peer) in mesh.neighbor_domains.clone().iter().enumerate() {
        let mut send_coords = Vec::new();
        let mut send_count = 0u32;
        for &node in &mesh.shared_nodes[pi] {
            match owner[node as usize].cmp(&self_rank) {
                std::cmp::Ordering::Equal => {
                    push_point(dim, &mut send_coords, mesh.node_point(node as usize));
                    send_count += 1;
                }
                _ if owner[node as usize] == peer => {
                    recv_targets[pi].push(node);
                }
                _ => {
                    // Owned by a third rank q; reconciled on the q channel instead.
                }
            }
        }

        if cfg!(debug_assertions) {
            let size_buf = send_count.to_le_bytes().to_vec();
            send_handles.push(comm.isend_bytes(peer, TAG_RECONCILE_SIZE, size_buf));
        }
        let payload = wire::serialize_points(&send_coords);
        send_handles.push(comm.isend_bytes(peer, TAG_RECONCILE_PAYLOAD, payload));
    }

    for (pi, &peer) in mesh.neighbor_domains.clone().iter().enumerate() {
        if cfg!(debug_assertions) {
            let size_bytes = comm.recv_bytes(peer, TAG_RECONCILE_SIZE)?;
            let declared = u32::from_le_bytes(size_bytes.as_slice().try_into().map_err(|_| {
                DistributedTessellationError::invalid_input("malformed reconciliation size prefix")
            })?);
            if declared as usize != recv_targets[pi].len() {
                log::warn!(
                    "rank {self_rank}: reconciliation size mismatch with peer {peer}: declared {declared}, expected {}",
                    recv_targets[pi].len()
                );
            }
        }
        let payload = comm.recv_bytes(peer, TAG_RECONCILE_PAYLOAD)?;
        let coords = wire::deserialize_points(&payload)?;
        for (i, &node) in recv_targets[pi].iter().enumerate() {
            let p = point_at(dim, &coords, i);
            overwrite_node(mesh, node as usize, p);
        }
    }

    for handle in send_handles {
        handle.wait()?;
    }

    Ok(())
}

/// spec.md §4.5 step 1: owner of every node starts as self, then is
/// lowered to `min(owner, p)` for every peer `p` that shares it.
fn owner_map(mesh: &Mesh, self_rank: u32) -> Vec<u32> {
    let mut owner = vec![self_rank; mesh.node_count()];
    for (pi, &peer) in mesh.neighbor_domains.iter().enumerate() {
        for &node in &mesh.shared_nodes[pi] {
            let slot = &mut owner[node as usize];
            *slot = (*slot).min(peer);
        }
    }
    owner
}

fn overwrite_node(mesh: &mut Mesh, node: usize, p: glam::DVec3) {
    let dim = mesh.dim.expect("mesh has no dimension set");
    let stride = dim.size();
    let base = node * stride;
    mesh.nodes[base] = p.x;
    mesh.nodes[base + 1] = p.y;
    if stride == 3 {
        mesh.nodes[base + 2] = p.z;
    }
}

/// spec.md §4.6: after reconciliation, drop neighbors with zero shared
/// nodes and zero shared faces.
pub fn prune_empty_neighbors(mesh: &mut Mesh) {
    let keep: Vec<bool> = (0..mesh.neighbor_domains.len())
        .map(|i| !mesh.shared_nodes[i].is_empty() || !mesh.shared_faces[i].is_empty())
        .collect();
    let mut i = 0;
    mesh.neighbor_domains.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
    let mut i = 0;
    mesh.shared_nodes.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
    let mut i = 0;
    mesh.shared_faces.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}
