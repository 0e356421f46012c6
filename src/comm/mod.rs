//! The message-passing runtime the distributed driver is written against
//! (spec.md §5). This crate never talks MPI directly in the core protocol
//! code; everything goes through [`Communicator`] so the protocol can be
//! exercised in-process in tests (see [`local`]) and driven by real MPI in
//! production (see [`mpi_backend`], behind the `mpi` feature).

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_backend;

use crate::error::Result;

/// A handle to an outstanding non-blocking send. The buffer it references
/// must stay alive until [`SendHandle::wait`] returns (spec.md §9:
/// "Non-blocking I/O... use a container outside the request-issuing loop").
pub trait SendHandle: Send {
    fn wait(self: Box<Self>) -> Result<()>;
}

/// Point-to-point + collective transport. One implementor instance models
/// one rank's view of `MPI_COMM_WORLD`.
pub trait Communicator {
    fn rank(&self) -> u32;
    fn size(&self) -> u32;

    /// Collective broadcast of a byte buffer rooted at `root`. On the root,
    /// `buf` is the data to send; on every other rank it is overwritten
    /// with the received payload. Broadcasts must be issued in the same
    /// order on every rank (spec.md §5: "every rank enters the same Pth
    /// call").
    fn broadcast_bytes(&self, root: u32, buf: &mut Vec<u8>) -> Result<()>;

    fn all_reduce_min_f64(&self, value: f64) -> Result<f64>;
    fn all_reduce_max_f64(&self, value: f64) -> Result<f64>;

    /// Debug-mode-only global barrier (spec.md §5).
    fn barrier(&self) -> Result<()>;

    /// Post a non-blocking send of `data` to `dest` tagged `tag`. Must not
    /// suspend; returns a handle whose `wait` must be called before the
    /// call returns from the enclosing phase.
    fn isend_bytes(&self, dest: u32, tag: u32, data: Vec<u8>) -> Box<dyn SendHandle>;

    /// Blocking receive of a byte buffer sent with `isend_bytes` using the
    /// same `tag` from `source`.
    fn recv_bytes(&self, source: u32, tag: u32) -> Result<Vec<u8>>;
}
