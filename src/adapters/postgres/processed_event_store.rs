//! PostgreSQL implementation of ProcessedEventStore.
//!
//! Claims are rows keyed by `(event_id, handler_name)`; `INSERT ... ON
//! CONFLICT DO NOTHING` makes the claim atomic, so exactly one of two
//! concurrent deliveries wins.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

/// PostgreSQL implementation of the ProcessedEventStore port.
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, error: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, error))
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn try_claim(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, handler_name, claimed_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (event_id, handler_name) DO NOTHING",
        )
        .bind(event_id.as_str())
        .bind(handler_name)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim event", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1 AND handler_name = $2")
            .bind(event_id.as_str())
            .bind(handler_name)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to release event claim", e))?;
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE claimed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to prune event claims", e))?;
        Ok(result.rows_affected())
    }
}
