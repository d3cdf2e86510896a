//! PostgreSQL implementation of UserDirectory.
//!
//! Reads from the platform's `users` table. This adapter only verifies
//! existence and pulls contact fields; user lifecycle is owned elsewhere.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{UserDirectory, UserRecord};

/// PostgreSQL implementation of the UserDirectory port.
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: Option<String>,
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, email, display_name FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to find user: {}", e),
                    )
                })?;

        Ok(row.map(|r| UserRecord {
            id: UserId::from_uuid(r.id),
            email: r.email,
            display_name: r.display_name,
        }))
    }
}
