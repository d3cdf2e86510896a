//! PostgreSQL implementation of EntitlementStore.
//!
//! The `entitlements` table keeps every row forever; revocation writes a
//! tombstone. A partial unique index over the grant key (restricted to
//! live rows) turns concurrent duplicate grants into a unique violation
//! which this adapter reports as `InsertOutcome::Duplicate`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entitlement::{
    Entitlement, EntitlementSource, EntitlementType, SourceType,
};
use crate::domain::foundation::{
    DomainError, EntitlementId, ErrorCode, MembershipId, OrganizationId, ProductId, ResourceId,
    Timestamp, UserId,
};
use crate::ports::{EntitlementStore, InsertOutcome};

/// PostgreSQL implementation of the EntitlementStore port.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an entitlement.
#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    id: Uuid,
    user_id: Uuid,
    organization_id: Uuid,
    organization_membership_id: Uuid,
    entitlement_type: String,
    source_type: String,
    source_id: Uuid,
    resource_id: Option<Uuid>,
    metadata: JsonValue,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let entitlement_type: EntitlementType = row.entitlement_type.parse()?;
        let source_type = parse_source_type(&row.source_type)?;
        let metadata = match row.metadata {
            JsonValue::Object(map) => map,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Entitlement metadata is not an object: {}", other),
                ))
            }
        };

        Ok(Entitlement {
            id: EntitlementId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            organization_membership_id: MembershipId::from_uuid(row.organization_membership_id),
            entitlement_type,
            source: EntitlementSource::from_parts(source_type, row.source_id),
            resource_id: row.resource_id.map(ResourceId::from_uuid),
            metadata,
            created_at: Timestamp::from_datetime(row.created_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_source_type(s: &str) -> Result<SourceType, DomainError> {
    match s {
        "purchase" => Ok(SourceType::Purchase),
        "coupon" => Ok(SourceType::Coupon),
        "manual" => Ok(SourceType::Manual),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid source_type value: {}", other),
        )),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

const SELECT_COLUMNS: &str = "id, user_id, organization_id, organization_membership_id, \
     entitlement_type, source_type, source_id, resource_id, metadata, created_at, deleted_at";

async fn insert_row<'e, E>(executor: E, entitlement: &Entitlement) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO entitlements (
            id, user_id, organization_id, organization_membership_id,
            entitlement_type, source_type, source_id, resource_id,
            metadata, created_at, deleted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(entitlement.id.as_uuid())
    .bind(entitlement.user_id.as_uuid())
    .bind(entitlement.organization_id.as_uuid())
    .bind(entitlement.organization_membership_id.as_uuid())
    .bind(entitlement.entitlement_type.as_str())
    .bind(entitlement.source.source_type().as_str())
    .bind(entitlement.source.source_id())
    .bind(entitlement.resource_id.map(|r| *r.as_uuid()))
    .bind(JsonValue::Object(entitlement.metadata.clone()))
    .bind(entitlement.created_at.as_datetime())
    .bind(entitlement.deleted_at.as_ref().map(|t| *t.as_datetime()))
    .execute(executor)
    .await
    .map(|_| ())
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn insert_if_absent(
        &self,
        entitlement: &Entitlement,
    ) -> Result<InsertOutcome<Entitlement>, DomainError> {
        match insert_row(&self.pool, entitlement).await {
            Ok(()) => Ok(InsertOutcome::Created(entitlement.clone())),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race; hand back the winner's live row.
                let winner = self.find_live_by_key(entitlement).await?.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Duplicate insert reported but no live row found",
                    )
                })?;
                Ok(InsertOutcome::Duplicate(winner))
            }
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert entitlement: {}", e),
            )),
        }
    }

    async fn tombstone(&self, id: &EntitlementId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE entitlements SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to tombstone entitlement: {}", e),
            )
        })?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM entitlements WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to look up entitlement: {}", e),
                )
            })?;
        if exists.is_some() {
            Ok(false)
        } else {
            Err(DomainError::new(
                ErrorCode::EntitlementNotFound,
                format!("Entitlement {} not found", id),
            ))
        }
    }

    async fn find_by_id(&self, id: &EntitlementId) -> Result<Option<Entitlement>, DomainError> {
        // Regrant after revoke reuses the derived id; prefer the live row.
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements WHERE id = $1 \
             ORDER BY (deleted_at IS NULL) DESC, created_at DESC LIMIT 1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find entitlement: {}", e),
            )
        })?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn live_for_user(&self, user_id: &UserId) -> Result<Vec<Entitlement>, DomainError> {
        let rows: Vec<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list entitlements: {}", e),
            )
        })?;

        rows.into_iter().map(Entitlement::try_from).collect()
    }

    async fn live_for_user_and_source(
        &self,
        user_id: &UserId,
        source: &EntitlementSource,
    ) -> Result<Vec<Entitlement>, DomainError> {
        let rows: Vec<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements \
             WHERE user_id = $1 AND source_type = $2 AND source_id = $3 \
               AND deleted_at IS NULL ORDER BY created_at"
        ))
        .bind(user_id.as_uuid())
        .bind(source.source_type().as_str())
        .bind(source.source_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list entitlements: {}", e),
            )
        })?;

        rows.into_iter().map(Entitlement::try_from).collect()
    }

    async fn live_user_ids_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Vec<UserId>, DomainError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM entitlements \
             WHERE resource_id = $1 AND deleted_at IS NULL",
        )
        .bind(resource_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list users for resource: {}", e),
            )
        })?;

        Ok(rows.into_iter().map(|(id,)| UserId::from_uuid(id)).collect())
    }

    async fn live_credits_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Entitlement>, DomainError> {
        let rows: Vec<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements \
             WHERE user_id = $1 AND entitlement_type = 'apply_credit' \
               AND metadata->>'eligibilityProductId' = $2 \
               AND deleted_at IS NULL ORDER BY created_at"
        ))
        .bind(user_id.as_uuid())
        .bind(product_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list credits: {}", e),
            )
        })?;

        rows.into_iter().map(Entitlement::try_from).collect()
    }

    async fn transfer_credit(
        &self,
        source_id: &EntitlementId,
        replacement: &Entitlement,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to begin transaction: {}", e),
            )
        })?;

        let result = sqlx::query(
            "UPDATE entitlements SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(source_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to tombstone credit: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM entitlements WHERE id = $1")
                    .bind(source_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| {
                        DomainError::new(
                            ErrorCode::DatabaseError,
                            format!("Failed to look up credit: {}", e),
                        )
                    })?;
            if exists.is_none() {
                return Err(DomainError::new(
                    ErrorCode::EntitlementNotFound,
                    format!("Credit entitlement {} not found", source_id),
                ));
            }
            // Already tombstoned by a previous attempt; fall through so the
            // replacement insert still happens.
        }

        match insert_row(&mut *tx, replacement).await {
            Ok(()) => {}
            // Replacement already live from a previous attempt.
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to insert replacement credit: {}", e),
                ))
            }
        }

        tx.commit().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to commit credit transfer: {}", e),
            )
        })
    }
}

impl PostgresEntitlementStore {
    /// Fetches the live row holding the same grant key as `entitlement`.
    async fn find_live_by_key(
        &self,
        entitlement: &Entitlement,
    ) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM entitlements \
             WHERE user_id = $1 AND source_type = $2 AND source_id = $3 \
               AND entitlement_type = $4 \
               AND resource_id IS NOT DISTINCT FROM $5 \
               AND deleted_at IS NULL"
        ))
        .bind(entitlement.user_id.as_uuid())
        .bind(entitlement.source.source_type().as_str())
        .bind(entitlement.source.source_id())
        .bind(entitlement.entitlement_type.as_str())
        .bind(entitlement.resource_id.map(|r| *r.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find entitlement by key: {}", e),
            )
        })?;

        row.map(Entitlement::try_from).transpose()
    }
}
