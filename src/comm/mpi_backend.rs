//! Real MPI transport, gated behind the `mpi` feature since it links
//! against a system MPI implementation (grounded on `Tehforsch-subsweep`'s
//! `mpi = "0.6"` dependency, the closest real-world crate in the corpus
//! pairing a meshless Voronoi construction with MPI).

use std::thread;

use mpi::point_to_point::{Destination, Source};
use mpi::topology::{Communicator as MpiCommunicatorTrait, SimpleCommunicator};
use mpi::traits::*;

use super::{Communicator, SendHandle};
use crate::error::{DistributedTessellationError, Result};

pub struct MpiCommunicator {
    world: SimpleCommunicator,
}

impl MpiCommunicator {
    /// Wrap an already-initialized `MPI_COMM_WORLD`. Call
    /// `mpi::initialize()` once at process startup and keep its
    /// `Universe` alive for the process lifetime; this type only borrows
    /// the communicator it hands out.
    pub fn world(universe: &mpi::environment::Universe) -> Self {
        MpiCommunicator {
            world: universe.world(),
        }
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> u32 {
        self.world.rank() as u32
    }

    fn size(&self) -> u32 {
        self.world.size() as u32
    }

    fn broadcast_bytes(&self, root: u32, buf: &mut Vec<u8>) -> Result<()> {
        let root_process = self.world.process_at_rank(root as i32);
        let mut len = buf.len() as u32;
        root_process.broadcast_into(&mut len);
        if self.rank() != root {
            buf.resize(len as usize, 0);
        }
        if len > 0 {
            root_process.broadcast_into(&mut buf[..]);
        }
        Ok(())
    }

    fn all_reduce_min_f64(&self, value: f64) -> Result<f64> {
        let mut result = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut result, mpi::collective::SystemOperation::min());
        Ok(result)
    }

    fn all_reduce_max_f64(&self, value: f64) -> Result<f64> {
        let mut result = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut result, mpi::collective::SystemOperation::max());
        Ok(result)
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn isend_bytes(&self, dest: u32, tag: u32, data: Vec<u8>) -> Box<dyn SendHandle> {
        // `rsmpi`'s non-blocking requests borrow their buffer for the
        // request's lifetime, which does not compose cleanly with a
        // trait-object handle returned across a function boundary. We get
        // the same "issue now, wait later" contract by handing the send to
        // a dedicated thread and joining it in `wait()`; the buffer lives
        // inside the thread's closure for exactly as long as the blocking
        // `send_with_tag` needs it.
        let dest_rank = dest as i32;
        let tag = tag as i32;
        // SimpleCommunicator is an MPI_Comm handle; MPI_COMM_WORLD is valid
        // process-wide, so re-deriving it inside the thread is safe.
        let handle = thread::spawn(move || -> Result<()> {
            let universe_world = mpi::topology::SimpleCommunicator::world();
            let process = universe_world.process_at_rank(dest_rank);
            process.send_with_tag(&data[..], tag);
            Ok(())
        });
        Box::new(MpiSendHandle { handle })
    }

    fn recv_bytes(&self, source: u32, tag: u32) -> Result<Vec<u8>> {
        let process = self.world.process_at_rank(source as i32);
        let (data, _status): (Vec<u8>, mpi::point_to_point::Status) =
            process.receive_vec_with_tag(tag as i32);
        Ok(data)
    }
}

struct MpiSendHandle {
    handle: thread::JoinHandle<Result<()>>,
}

impl SendHandle for MpiSendHandle {
    fn wait(self: Box<Self>) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| DistributedTessellationError::comm_failure(JoinError))?
    }
}

#[derive(Debug, thiserror::Error)]
#[error("MPI send thread panicked")]
struct JoinError;
