//! Error kinds (spec.md §7). Nothing is recovered locally inside a single
//! `tessellate()` call: everything here surfaces to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributedTessellationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serial tessellator failed: {0}")]
    SerialTessellatorFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("communication error: {0}")]
    CommunicationError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Debug-only: raised by the post-conditions verifier. In release
    /// builds the verifier does not run and this variant is unreachable.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
}

impl DistributedTessellationError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        DistributedTessellationError::InvalidInput(msg.into())
    }

    pub fn comm_failure(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        DistributedTessellationError::CommunicationError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, DistributedTessellationError>;
