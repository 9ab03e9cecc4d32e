//! The fulfillment evaluator: the single business rule of the lifecycle.
//!
//! Pure function of (current status, target units, post-pledge total).
//! It owns no storage and takes no locks, so the threshold rule can be
//! tested exhaustively without the ledger around it.

use crate::request::RequestStatus;

/// Raised when the evaluator is consulted about a request that is not
/// pending. The ledger rejects terminal-state mutations before evaluation,
/// so reaching this is a ledger bug, not a caller error — it is surfaced
/// loudly instead of being absorbed into a status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("evaluator consulted on a non-pending request (status: {status})")]
pub struct EvaluatorError {
    pub status: RequestStatus,
}

/// Decide the status of a pending request after its pledge total changed.
///
/// Returns `Fulfilled` exactly when `total_units` has reached or passed
/// `required_units`; otherwise the request stays `Pending`. Ties and
/// overshoot both fulfill: pledges are recorded in full, never trimmed to
/// the remaining need.
pub fn evaluate(
    current: RequestStatus,
    required_units: u32,
    total_units: u64,
) -> Result<RequestStatus, EvaluatorError> {
    if current != RequestStatus::Pending {
        return Err(EvaluatorError { status: current });
    }

    if total_units >= u64::from(required_units) {
        Ok(RequestStatus::Fulfilled)
    } else {
        Ok(RequestStatus::Pending)
    }
}
