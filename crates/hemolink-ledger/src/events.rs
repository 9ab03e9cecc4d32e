//! Append-only request event log with deterministic replay.
//!
//! `request.event.v1` is the audit envelope: every accepted mutation
//! appends exactly one event line. Replaying the log from an empty state
//! rebuilds the same documents the ledger published, including the status
//! transitions the evaluator decided at the time.

use chrono::{DateTime, Utc};
use hemolink_core::{DonorId, Pledge, RequestId, RequestStatus, UrgentRequest, evaluate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const REQUEST_EVENT_SCHEMA: &str = "request.event.v1";

fn default_request_event_schema() -> String {
    REQUEST_EVENT_SCHEMA.to_string()
}

/// What happened to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequestEventAction {
    /// A request was opened. Carries the full initial document.
    Opened { request: UrgentRequest },
    /// A pledge was accepted against a pending request.
    PledgeAccepted { donor: DonorId, units: u32 },
    /// The request was administratively cancelled.
    Cancelled,
    /// The target was administratively changed.
    Retargeted { required_units: u32 },
}

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    #[serde(default = "default_request_event_schema")]
    pub schema: String,
    pub event_id: String,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub action: RequestEventAction,
}

impl RequestEvent {
    pub fn opened(request: UrgentRequest) -> Self {
        let request_id = request.id;
        Self {
            schema: REQUEST_EVENT_SCHEMA.to_string(),
            event_id: format!("request.opened:{request_id}"),
            request_id,
            occurred_at: request.created_at,
            action: RequestEventAction::Opened { request },
        }
    }

    /// `sequence` is the index of the pledge in the request's log, which
    /// keeps event ids deterministic under replay.
    pub fn pledge_accepted(
        request_id: RequestId,
        sequence: usize,
        donor: DonorId,
        units: u32,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema: REQUEST_EVENT_SCHEMA.to_string(),
            event_id: format!("request.pledge:{request_id}:{sequence}"),
            request_id,
            occurred_at,
            action: RequestEventAction::PledgeAccepted { donor, units },
        }
    }

    pub fn cancelled(request_id: RequestId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            schema: REQUEST_EVENT_SCHEMA.to_string(),
            event_id: format!("request.cancelled:{request_id}"),
            request_id,
            occurred_at,
            action: RequestEventAction::Cancelled,
        }
    }

    pub fn retargeted(
        request_id: RequestId,
        required_units: u32,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema: REQUEST_EVENT_SCHEMA.to_string(),
            event_id: format!("request.retargeted:{request_id}:{required_units}"),
            request_id,
            occurred_at,
            action: RequestEventAction::Retargeted { required_units },
        }
    }
}

/// Errors from event-log operations.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("replay error for {request_id}: {reason}")]
    Replay {
        request_id: RequestId,
        reason: String,
    },
}

/// Read events from a JSONL reader.
pub fn read_events(reader: impl BufRead) -> Result<Vec<RequestEvent>, EventError> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EventError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: RequestEvent = serde_json::from_str(trimmed)
            .map_err(|e| EventError::Parse(line_no + 1, e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

/// Read events from a JSONL file path.
pub fn read_events_from_path(path: impl AsRef<Path>) -> Result<Vec<RequestEvent>, EventError> {
    let file = File::open(path.as_ref())
        .map_err(|e| EventError::Io(0, format!("{}: {e}", path.as_ref().display())))?;
    read_events(BufReader::new(file))
}

/// Rebuild request documents by replaying events in log order.
///
/// Replay re-runs the evaluator on every accepted pledge and retarget, so a
/// log produced by a correct ledger rebuilds byte-identical documents. A log
/// that mutates a terminal request is rejected: the ledger would never have
/// written it.
pub fn replay_events(
    events: &[RequestEvent],
) -> Result<BTreeMap<RequestId, UrgentRequest>, EventError> {
    let mut requests: BTreeMap<RequestId, UrgentRequest> = BTreeMap::new();

    for event in events {
        match &event.action {
            RequestEventAction::Opened { request } => {
                requests.insert(event.request_id, request.clone());
            }
            RequestEventAction::PledgeAccepted { donor, units } => {
                let request = lookup_mut(&mut requests, event.request_id)?;
                let next = evaluate(
                    request.status,
                    request.required_units,
                    request.total_units() + u64::from(*units),
                )
                .map_err(|e| EventError::Replay {
                    request_id: event.request_id,
                    reason: e.to_string(),
                })?;
                request.record_pledge(Pledge {
                    donor: donor.clone(),
                    units: *units,
                    pledged_at: event.occurred_at,
                });
                if next != request.status {
                    request.set_status(next, event.occurred_at);
                }
            }
            RequestEventAction::Cancelled => {
                let request = lookup_mut(&mut requests, event.request_id)?;
                if request.status.is_terminal() {
                    return Err(EventError::Replay {
                        request_id: event.request_id,
                        reason: format!("cancel of a {} request", request.status),
                    });
                }
                request.set_status(RequestStatus::Cancelled, event.occurred_at);
            }
            RequestEventAction::Retargeted { required_units } => {
                let request = lookup_mut(&mut requests, event.request_id)?;
                let next = evaluate(request.status, *required_units, request.total_units())
                    .map_err(|e| EventError::Replay {
                        request_id: event.request_id,
                        reason: e.to_string(),
                    })?;
                request.required_units = *required_units;
                request.set_status(next, event.occurred_at);
            }
        }
    }

    Ok(requests)
}

/// Replay a JSONL event log from a file path.
pub fn replay_events_from_path(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<RequestId, UrgentRequest>, EventError> {
    let events = read_events_from_path(path)?;
    replay_events(&events)
}

fn lookup_mut(
    requests: &mut BTreeMap<RequestId, UrgentRequest>,
    id: RequestId,
) -> Result<&mut UrgentRequest, EventError> {
    requests.get_mut(&id).ok_or(EventError::Replay {
        request_id: id,
        reason: "event references a request never opened".to_string(),
    })
}

/// Append-only journal over a JSONL event file.
///
/// One event per accepted mutation, written and flushed before the ledger
/// publishes the new state.
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    append_lock: tokio::sync::Mutex<()>,
}

impl EventJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event line and flush it.
    pub async fn append(&self, event: &RequestEvent) -> Result<(), EventError> {
        let line =
            serde_json::to_string(event).map_err(|e| EventError::Serialize(e.to_string()))?;

        let _guard = self.append_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| EventError::Io(0, format!("{parent:?}: {e}")))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| EventError::Io(0, format!("{}: {e}", self.path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| EventError::Io(0, format!("{}: {e}", self.path.display())))?;
        file.sync_all()
            .map_err(|e| EventError::Io(0, format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}
