//! The persistence seam for request documents.
//!
//! The ledger persists through this trait before publishing any mutation,
//! so a backend failure is observable to the caller but a half-applied
//! mutation never is. Backends do not interpret documents; they store and
//! return them whole.

use hemolink_core::{RequestId, UrgentRequest};
use std::collections::BTreeMap;

use crate::jsonl::JsonlError;

/// Errors raised by store backends. Converted to the opaque
/// `LedgerError::Storage` kind at the ledger boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Durable storage for request documents.
#[async_trait::async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert or replace one document by identity. Must be durable before
    /// returning.
    async fn persist(&self, request: &UrgentRequest) -> Result<(), StoreError>;

    /// Return every stored document (used to hydrate a ledger on startup).
    async fn load_all(&self) -> Result<Vec<UrgentRequest>, StoreError>;
}

/// Store backend with no durability: documents live in process memory.
///
/// Useful for tests and for deployments where the event journal alone is
/// the durable record.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    requests: tokio::sync::Mutex<BTreeMap<RequestId, UrgentRequest>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RequestStore for InMemoryStore {
    async fn persist(&self, request: &UrgentRequest) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<UrgentRequest>, StoreError> {
        let requests = self.requests.lock().await;
        Ok(requests.values().cloned().collect())
    }
}
