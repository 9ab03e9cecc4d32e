//! # hemolink-ledger
//!
//! Stateful layer for the urgent-request fulfillment lifecycle.
//!
//! This crate provides:
//! - `RequestLedger`: the single authority for request state, with one
//!   serialization unit per request identity (mutations against the same
//!   request are linearized; different requests never contend)
//! - `RequestStore`: the persistence seam, with an in-memory backend and a
//!   JSONL snapshot backend (atomic replace-on-write)
//! - `EventJournal`: append-only request event log with deterministic replay
//! - read-side filtering, ordering, and dashboard stats over snapshots
//!
//! The business rule itself (threshold crossing) lives in `hemolink-core`;
//! this crate only decides *when* it runs and makes its outcome durable.
//!
//! ## Data flow
//!
//! ```text
//! caller op ──▶ per-request mutex ──▶ evaluate ──▶ persist + journal
//!                                                       │
//!                                   published snapshot ◀┘  (readers)
//! ```

pub mod events;
pub mod jsonl;
pub mod ledger;
pub mod query;
pub mod store;

pub use events::{
    EventError, EventJournal, REQUEST_EVENT_SCHEMA, RequestEvent, RequestEventAction,
    read_events, read_events_from_path, replay_events, replay_events_from_path,
};
pub use jsonl::{JsonlError, JsonlStore, read_requests_from_path, write_requests_to_path};
pub use ledger::{PledgeReceipt, RequestLedger};
pub use query::{LedgerStats, RequestFilter, compute_stats, most_recent_first};
pub use store::{InMemoryStore, RequestStore, StoreError};
