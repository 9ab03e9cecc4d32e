//! Urgent request documents and the pledge log.
//!
//! An `UrgentRequest` is the unit of coordination: a target number of units
//! for one blood type, plus the append-only log of donor pledges made
//! against it. Pledges are never removed or trimmed, so the running total
//! is monotonically non-decreasing over the life of a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::blood::BloodType;

/// Opaque identity of an urgent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Mint a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a pledging or requesting party, resolved by the caller's
/// authentication layer. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonorId(pub String);

impl DonorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DonorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request lifecycle status.
///
/// `Pending` is the only state that accepts mutations. `Fulfilled` and
/// `Cancelled` are terminal: no pledge and no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    /// Whether this status admits no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Fulfilled | RequestStatus::Cancelled)
    }

    /// String representation, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive urgency classification. Presentation-facing only; it has no
/// effect on the state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    Normal,
    Urgent,
    Critical,
}

/// One donor's committed units toward a request.
///
/// `pledged_at` is stamped at acceptance time by the ledger, never supplied
/// by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pledge {
    pub donor: DonorId,
    pub units: u32,
    pub pledged_at: DateTime<Utc>,
}

/// Caller-supplied fields for opening a request.
///
/// Descriptive text (patient, hospital, contact) is validated by the caller;
/// the core only enforces the typed fields and the positive-units rule.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub patient: String,
    pub hospital: String,
    pub contact: String,
    pub blood_type: BloodType,
    pub required_units: u32,
    pub urgency: UrgencyLevel,
    pub created_by: Option<DonorId>,
    pub notes: String,
}

impl NewRequest {
    pub fn new(
        patient: impl Into<String>,
        hospital: impl Into<String>,
        contact: impl Into<String>,
        blood_type: BloodType,
        required_units: u32,
    ) -> Self {
        Self {
            patient: patient.into(),
            hospital: hospital.into(),
            contact: contact.into(),
            blood_type,
            required_units,
            urgency: UrgencyLevel::Normal,
            created_by: None,
            notes: String::new(),
        }
    }

    pub fn urgency(mut self, urgency: UrgencyLevel) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn created_by(mut self, requester: DonorId) -> Self {
        self.created_by = Some(requester);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// An urgent blood request: the document the ledger is authoritative for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgentRequest {
    pub id: RequestId,

    pub patient: String,
    pub hospital: String,
    pub contact: String,
    pub blood_type: BloodType,

    /// Target units. Fixed at creation; changed only through the ledger's
    /// explicit administrative retarget path.
    pub required_units: u32,

    #[serde(default)]
    pub urgency: UrgencyLevel,
    pub status: RequestStatus,

    /// Append-only; insertion order is arrival order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pledges: Vec<Pledge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<DonorId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UrgentRequest {
    /// Open a new pending request with no pledges.
    ///
    /// Positive-units validation is the ledger's job; this constructor only
    /// assembles the document.
    pub fn open(new: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            patient: new.patient,
            hospital: new.hospital,
            contact: new.contact,
            blood_type: new.blood_type,
            required_units: new.required_units,
            urgency: new.urgency,
            status: RequestStatus::Pending,
            pledges: Vec::new(),
            created_by: new.created_by,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all accepted pledge units.
    pub fn total_units(&self) -> u64 {
        self.pledges.iter().map(|p| u64::from(p.units)).sum()
    }

    /// Append an accepted pledge and bump `updated_at`.
    pub fn record_pledge(&mut self, pledge: Pledge) {
        self.updated_at = pledge.pledged_at;
        self.pledges.push(pledge);
    }

    /// Set the status and bump `updated_at`.
    pub fn set_status(&mut self, status: RequestStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}
