//! In-memory processed event store for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

/// In-memory [`ProcessedEventStore`].
pub struct InMemoryProcessedEventStore {
    claims: Mutex<HashMap<(String, String), Timestamp>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Number of claims held (for test assertions).
    pub fn claim_count(&self) -> usize {
        self.claims
            .lock()
            .expect("InMemoryProcessedEventStore: lock poisoned")
            .len()
    }
}

impl Default for InMemoryProcessedEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn try_claim(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<bool, DomainError> {
        let key = (event_id.as_str().to_string(), handler_name.to_string());
        let mut claims = self
            .claims
            .lock()
            .expect("InMemoryProcessedEventStore: lock poisoned");
        if claims.contains_key(&key) {
            return Ok(false);
        }
        claims.insert(key, Timestamp::now());
        Ok(true)
    }

    async fn release(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError> {
        let key = (event_id.as_str().to_string(), handler_name.to_string());
        self.claims
            .lock()
            .expect("InMemoryProcessedEventStore: lock poisoned")
            .remove(&key);
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut claims = self
            .claims
            .lock()
            .expect("InMemoryProcessedEventStore: lock poisoned");
        let before = claims.len();
        claims.retain(|_, claimed_at| !claimed_at.is_before(&timestamp));
        Ok((before - claims.len()) as u64)
    }
}
