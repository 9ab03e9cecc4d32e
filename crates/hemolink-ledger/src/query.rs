//! Read-side queries over published snapshots.
//!
//! Pure functions: the ledger hands them cloned snapshots, so queries never
//! contend with in-flight mutations. Ordering mirrors the presentation
//! policy of the coordination service: most recent first.

use hemolink_core::{BloodType, RequestStatus, UrgentRequest};
use serde::Serialize;

/// Optional criteria for `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub blood_type: Option<BloodType>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn blood_type(blood_type: BloodType) -> Self {
        Self {
            blood_type: Some(blood_type),
            ..Self::default()
        }
    }

    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &UrgentRequest) -> bool {
        if let Some(blood_type) = self.blood_type
            && request.blood_type != blood_type
        {
            return false;
        }
        if let Some(status) = self.status
            && request.status != status
        {
            return false;
        }
        true
    }
}

/// Sort snapshots by `created_at` descending, request id as a stable
/// tiebreak for equal timestamps.
pub fn most_recent_first(requests: &mut [UrgentRequest]) {
    requests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Dashboard counts over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub fulfilled: usize,
    pub cancelled: usize,
    /// Units still needed across pending requests. Overshoot on one request
    /// never offsets the need of another.
    pub units_outstanding: u64,
}

/// Compute dashboard counts from a set of snapshots.
pub fn compute_stats<'a>(requests: impl IntoIterator<Item = &'a UrgentRequest>) -> LedgerStats {
    let mut stats = LedgerStats::default();
    for request in requests {
        stats.total += 1;
        match request.status {
            RequestStatus::Pending => {
                stats.pending += 1;
                let required = u64::from(request.required_units);
                stats.units_outstanding += required.saturating_sub(request.total_units());
            }
            RequestStatus::Fulfilled => stats.fulfilled += 1,
            RequestStatus::Cancelled => stats.cancelled += 1,
        }
    }
    stats
}
