//! EventPublisher port - interface for publishing domain events.
//!
//! The domain publishes entitlement lifecycle events without knowing the
//! underlying transport (in-memory, message bus, outbox).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Implementations must ensure:
/// - Events are delivered at-least-once (handlers may receive duplicates)
/// - `publish_all` is atomic where the adapter supports it
/// - Errors are propagated to the caller
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish multiple events.
    ///
    /// All events are published or none are, where the adapter supports
    /// atomicity. Otherwise events go out sequentially with best-effort
    /// delivery.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
