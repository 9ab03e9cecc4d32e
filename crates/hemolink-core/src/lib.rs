//! # Hemolink Core
//!
//! Domain layer for the urgent blood request fulfillment lifecycle.
//!
//! A request asks for N units of one blood type. Donors pledge units over
//! time; the first pledge whose running total reaches the target flips the
//! request from pending to fulfilled, and nothing mutates it afterwards.
//!
//! This crate is deliberately pure: documents, the status state machine,
//! and the threshold decision. It performs no I/O and knows nothing about
//! locking or persistence — those concerns live in `hemolink-ledger`.
//!
//! ## Data model
//!
//! ```text
//! BloodType              ← fixed 8-variant ABO/Rh enumeration
//!     │
//! UrgentRequest          ← document: target units, status, pledge log
//!     │
//! Pledge                 ← one donor's committed units (append-only)
//!     │
//! evaluate(...)          ← the single business rule: threshold crossing
//! ```

pub mod blood;
pub mod error;
pub mod evaluator;
pub mod request;

pub use blood::{ALL_BLOOD_TYPES, BloodType, ParseBloodTypeError};
pub use error::LedgerError;
pub use evaluator::{EvaluatorError, evaluate};
pub use request::{
    DonorId, NewRequest, Pledge, RequestId, RequestStatus, UrgencyLevel, UrgentRequest,
};
