//! Transactional outbox implementation of EventPublisher.
//!
//! Emitted events are appended to an `event_outbox` table; a separate relay
//! drains the table and forwards rows to the durable-execution layer. The
//! engine only ever appends.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// Appends emitted events to the `event_outbox` table.
pub struct PostgresEventOutbox {
    pool: PgPool,
}

impl PostgresEventOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn append<'e, E>(executor: E, event: &EventEnvelope) -> Result<(), DomainError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let metadata = serde_json::to_value(&event.metadata).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Failed to serialize event metadata: {}", e),
        )
    })?;

    // Redelivered events share an event id; the first append wins and the
    // rest are no-ops, which is all at-least-once delivery needs.
    sqlx::query(
        "INSERT INTO event_outbox \
         (event_id, event_type, schema_version, aggregate_id, aggregate_type, \
          occurred_at, payload, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event.event_id.as_str())
    .bind(&event.event_type)
    .bind(event.schema_version as i32)
    .bind(&event.aggregate_id)
    .bind(&event.aggregate_type)
    .bind(event.occurred_at.as_datetime())
    .bind(&event.payload)
    .bind(metadata)
    .execute(executor)
    .await
    .map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to append event to outbox: {}", e),
        )
    })?;

    Ok(())
}

#[async_trait]
impl EventPublisher for PostgresEventOutbox {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        append(&self.pool, &event).await
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to open outbox transaction: {}", e),
            )
        })?;

        for event in &events {
            append(&mut *tx, event).await?;
        }

        tx.commit().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to commit outbox transaction: {}", e),
            )
        })
    }
}
