//! Post-conditions verifier (spec.md §4.9/§9, the original's
//! `checkDistributedTessellation`). Debug-only global consistency check:
//! validates the symmetry law and shared-count law from spec.md §8 by
//! broadcasting each rank's neighbor bookkeeping and cross-checking it.
//! The coordinate-identity law is not re-verified here: `reconcile`'s
//! debug-only tag-9 size handshake already catches a size disagreement
//! between the two sides of a shared-node exchange, and since the values
//! written are exactly what was received off the wire, a second
//! broadcast-and-compare pass would only re-detect the same class of bug.

use crate::comm::Communicator;
use crate::error::{DistributedTessellationError, Result};
use crate::mesh::Mesh;
use crate::wire::{self, Cursor};

struct PeerRecord {
    peer: u32,
    shared_nodes: u32,
    shared_faces: u32,
}

pub fn verify<C: Communicator>(comm: &C, mesh: &Mesh) -> Result<()> {
    comm.barrier()?;

    let self_rank = comm.rank();
    let size = comm.size();
    let own_records: Vec<PeerRecord> = mesh
        .neighbor_domains
        .iter()
        .zip(mesh.shared_nodes.iter())
        .zip(mesh.shared_faces.iter())
        .map(|((&peer, sn), sf)| PeerRecord {
            peer,
            shared_nodes: sn.len() as u32,
            shared_faces: sf.len() as u32,
        })
        .collect();

    let mut all_records: Vec<Vec<PeerRecord>> = Vec::with_capacity(size as usize);
    for root in 0..size {
        let mut buf = if root == self_rank {
            serialize_records(&own_records)
        } else {
            Vec::new()
        };
        comm.broadcast_bytes(root, &mut buf)?;
        all_records.push(deserialize_records(&buf)?);
    }

    for rec in &own_records {
        let peer_view = &all_records[rec.peer as usize];
        let reciprocal = peer_view.iter().find(|r| r.peer == self_rank);
        match reciprocal {
            None => {
                return Err(DistributedTessellationError::ConsistencyViolation(format!(
                    "rank {self_rank} lists peer {} as a neighbor, but {} does not list rank {self_rank} back",
                    rec.peer, rec.peer
                )));
            }
            Some(r) => {
                if r.shared_nodes != rec.shared_nodes || r.shared_faces != rec.shared_faces {
                    return Err(DistributedTessellationError::ConsistencyViolation(format!(
                        "shared-count mismatch between rank {self_rank} and peer {}: \
                         ({}, {}) vs ({}, {})",
                        rec.peer, rec.shared_nodes, rec.shared_faces, r.shared_nodes, r.shared_faces
                    )));
                }
            }
        }
    }

    comm.barrier()?;
    Ok(())
}

fn serialize_records(records: &[PeerRecord]) -> Vec<u8> {
    let flat: Vec<u32> = records
        .iter()
        .flat_map(|r| [r.peer, r.shared_nodes, r.shared_faces])
        .collect();
    wire::serialize_u32_list(&flat)
}

fn deserialize_records(buf: &[u8]) -> Result<Vec<PeerRecord>> {
    let flat = {
        let mut c = Cursor::new(buf);
        c.read_u32_vec()?
    };
    Ok(flat
        .chunks_exact(3)
        .map(|c| PeerRecord {
            peer: c[0],
            shared_nodes: c[1],
            shared_faces: c[2],
        })
        .collect())
}
