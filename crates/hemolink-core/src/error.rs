//! Error taxonomy for ledger operations.
//!
//! Three caller-facing kinds (`InvalidArgument`, `NotFound`, `Closed`) plus
//! an opaque `Storage` kind for persistence failures the core does not
//! interpret. All are reported synchronously; none is retried internally.

use crate::request::{RequestId, RequestStatus};

/// Errors returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input: non-positive units or target.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// No request with this identity exists.
    #[error("request not found: {0}")]
    NotFound(RequestId),

    /// The request is already in a terminal state; the mutation was not
    /// applied and no pledge was recorded.
    #[error("request {id} is closed (status: {status})")]
    Closed { id: RequestId, status: RequestStatus },

    /// Persistence-layer failure, surfaced opaquely.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same input could ever succeed. Only storage
    /// failures are retryable; the taxonomy kinds need a different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}
