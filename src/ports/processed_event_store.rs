//! ProcessedEventStore port - idempotent event intake.
//!
//! Triggering events are delivered at-least-once: the durable-execution
//! layer retries, publishers restart, consumers crash before acking. Every
//! handler claims an event before doing work; a second delivery fails the
//! claim and is dropped.
//!
//! A claim is released if the handler fails with a retriable error, so the
//! redelivery that follows can claim it again.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Port for tracking which events each handler has processed.
///
/// Claims are scoped per handler: two handlers can process the same event
/// independently, each exactly once.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Atomically claims an event for a handler.
    ///
    /// Returns `true` if this call took the claim, `false` if the event
    /// was already claimed by this handler. The atomicity of this check
    /// is what makes concurrent duplicate deliveries safe.
    async fn try_claim(&self, event_id: &EventId, handler_name: &str)
        -> Result<bool, DomainError>;

    /// Releases a claim so a redelivery can retry the handler.
    ///
    /// Called when handling fails with a retriable error. Releasing an
    /// unclaimed event is a no-op.
    async fn release(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError>;

    /// Deletes claims older than the given timestamp.
    ///
    /// Retention cleanup. Returns the number of entries deleted.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
