//! The request ledger: single authority for urgent-request state.
//!
//! Every mutation funnels through one serialization unit per request
//! identity, so concurrent pledges against the same request are linearized
//! (each sees the other's effect) while different requests never contend.
//! The original coordination service got first-writer-wins behavior for
//! free from single-threaded request handling; here the serialization is
//! explicit.
//!
//! Commit order for a mutation: persist the document, append the audit
//! event, then publish the snapshot to readers. A failure before publish
//! surfaces as `LedgerError::Storage` and readers never observe a partially
//! applied mutation.

use chrono::Utc;
use dashmap::DashMap;
use hemolink_core::{
    DonorId, LedgerError, NewRequest, Pledge, RequestId, RequestStatus, UrgentRequest, evaluate,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::events::{EventJournal, RequestEvent};
use crate::query::{self, LedgerStats, RequestFilter};
use crate::store::RequestStore;

/// Outcome of an accepted pledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PledgeReceipt {
    pub status: RequestStatus,
    pub total_units: u64,
}

/// Authoritative, serialized store of urgent-request state.
pub struct RequestLedger<S> {
    store: S,
    journal: Option<EventJournal>,
    /// Published snapshots. Readers see these; only the mutation path
    /// writes them.
    requests: DashMap<RequestId, UrgentRequest>,
    /// One serialization unit per request identity.
    locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl<S: RequestStore> RequestLedger<S> {
    /// An empty ledger over a store backend.
    pub fn new(store: S) -> Self {
        Self {
            store,
            journal: None,
            requests: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Attach an append-only audit journal. Every accepted mutation writes
    /// one event before it is published.
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Build a ledger from everything the store already holds.
    pub async fn hydrate(store: S) -> Result<Self, LedgerError> {
        let existing = store
            .load_all()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let ledger = Self::new(store);
        for request in existing {
            ledger.requests.insert(request.id, request);
        }
        Ok(ledger)
    }

    /// Open a new pending request with no pledges.
    pub async fn create(&self, new: NewRequest) -> Result<UrgentRequest, LedgerError> {
        if new.required_units == 0 {
            return Err(LedgerError::invalid_argument(
                "required_units must be positive",
            ));
        }

        let request = UrgentRequest::open(new, Utc::now());
        self.commit(request.clone(), RequestEvent::opened(request.clone()))
            .await?;

        info!(
            id = %request.id,
            blood_type = %request.blood_type,
            required_units = request.required_units,
            "urgent request opened"
        );
        Ok(request)
    }

    /// Record a donor's pledge against a pending request.
    ///
    /// The pledge is recorded in full even when it overshoots the remaining
    /// need; the post-pledge total decides the next status.
    pub async fn submit_pledge(
        &self,
        id: RequestId,
        donor: DonorId,
        units: u32,
    ) -> Result<PledgeReceipt, LedgerError> {
        if units == 0 {
            return Err(LedgerError::invalid_argument("units must be positive"));
        }

        let lock = self.mutation_lock(id)?;
        let _guard = lock.lock().await;

        let mut request = self.snapshot(id)?;
        if request.status.is_terminal() {
            debug!(id = %id, donor = %donor, status = %request.status, "pledge rejected: closed");
            return Err(LedgerError::Closed {
                id,
                status: request.status,
            });
        }

        let total_units = request.total_units() + u64::from(units);
        let next = evaluate(request.status, request.required_units, total_units)
            .map_err(|e| LedgerError::Closed { id, status: e.status })?;

        let now = Utc::now();
        let sequence = request.pledges.len();
        request.record_pledge(Pledge {
            donor: donor.clone(),
            units,
            pledged_at: now,
        });
        if next != request.status {
            request.set_status(next, now);
        }

        self.commit(
            request,
            RequestEvent::pledge_accepted(id, sequence, donor.clone(), units, now),
        )
        .await?;

        if next == RequestStatus::Fulfilled {
            info!(id = %id, donor = %donor, units, total_units, "request fulfilled");
        } else {
            debug!(id = %id, donor = %donor, units, total_units, "pledge accepted");
        }
        Ok(PledgeReceipt {
            status: next,
            total_units,
        })
    }

    /// Administratively cancel a pending request. Terminal and irreversible.
    pub async fn cancel(&self, id: RequestId) -> Result<UrgentRequest, LedgerError> {
        let lock = self.mutation_lock(id)?;
        let _guard = lock.lock().await;

        let mut request = self.snapshot(id)?;
        if request.status.is_terminal() {
            return Err(LedgerError::Closed {
                id,
                status: request.status,
            });
        }

        let now = Utc::now();
        request.set_status(RequestStatus::Cancelled, now);
        self.commit(request.clone(), RequestEvent::cancelled(id, now))
            .await?;

        info!(id = %id, "request cancelled");
        Ok(request)
    }

    /// Administratively change the target units of a pending request.
    ///
    /// The evaluator re-runs against the existing pledge total, so lowering
    /// the target below what is already pledged fulfills the request here
    /// rather than leaving a stale status.
    pub async fn retarget(
        &self,
        id: RequestId,
        required_units: u32,
    ) -> Result<UrgentRequest, LedgerError> {
        if required_units == 0 {
            return Err(LedgerError::invalid_argument(
                "required_units must be positive",
            ));
        }

        let lock = self.mutation_lock(id)?;
        let _guard = lock.lock().await;

        let mut request = self.snapshot(id)?;
        if request.status.is_terminal() {
            return Err(LedgerError::Closed {
                id,
                status: request.status,
            });
        }

        let next = evaluate(request.status, required_units, request.total_units())
            .map_err(|e| LedgerError::Closed { id, status: e.status })?;

        let now = Utc::now();
        request.required_units = required_units;
        request.set_status(next, now);
        self.commit(
            request.clone(),
            RequestEvent::retargeted(id, required_units, now),
        )
        .await?;

        info!(id = %id, required_units, status = %next, "request retargeted");
        Ok(request)
    }

    /// Read-only snapshot of one request.
    pub fn get(&self, id: RequestId) -> Result<UrgentRequest, LedgerError> {
        self.snapshot(id)
    }

    /// Read-only filtered listing, most recent first.
    pub fn list(&self, filter: RequestFilter) -> Vec<UrgentRequest> {
        let mut requests: Vec<UrgentRequest> = self
            .requests
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        query::most_recent_first(&mut requests);
        requests
    }

    /// Dashboard counts over all requests.
    pub fn stats(&self) -> LedgerStats {
        let requests: Vec<UrgentRequest> = self
            .requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        query::compute_stats(requests.iter())
    }

    /// Number of requests the ledger knows about.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the ledger holds zero requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn snapshot(&self, id: RequestId) -> Result<UrgentRequest, LedgerError> {
        self.requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::NotFound(id))
    }

    /// The serialization unit for one request identity. Requests are never
    /// deleted, so existence checked here still holds once the lock is won.
    fn mutation_lock(&self, id: RequestId) -> Result<Arc<Mutex<()>>, LedgerError> {
        if !self.requests.contains_key(&id) {
            return Err(LedgerError::NotFound(id));
        }
        Ok(self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Persist, journal, then publish. Nothing is observable to readers
    /// until all three succeed.
    async fn commit(
        &self,
        request: UrgentRequest,
        event: RequestEvent,
    ) -> Result<(), LedgerError> {
        self.store
            .persist(&request)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        if let Some(journal) = &self.journal {
            journal
                .append(&event)
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
        }
        self.requests.insert(request.id, request);
        Ok(())
    }
}
