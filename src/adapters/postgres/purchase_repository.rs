//! PostgreSQL implementation of PurchaseRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CouponId, DomainError, ErrorCode, OrganizationId, ProductId, PurchaseId, Timestamp, UserId,
};
use crate::domain::purchase::{Purchase, PurchaseStatus};
use crate::ports::PurchaseRepository;

/// PostgreSQL implementation of the PurchaseRepository port.
pub struct PostgresPurchaseRepository {
    pool: PgPool,
}

impl PostgresPurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a purchase.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    status: String,
    total_amount_cents: i64,
    bulk_coupon_id: Option<Uuid>,
    redeemed_bulk_coupon_id: Option<Uuid>,
    organization_id: Option<Uuid>,
    charge_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let status: PurchaseStatus = row.status.parse()?;
        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            product_id: ProductId::from_uuid(row.product_id),
            status,
            total_amount_cents: row.total_amount_cents,
            bulk_coupon_id: row.bulk_coupon_id.map(CouponId::from_uuid),
            redeemed_bulk_coupon_id: row.redeemed_bulk_coupon_id.map(CouponId::from_uuid),
            organization_id: row.organization_id.map(OrganizationId::from_uuid),
            charge_id: row.charge_id,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn db_error(context: &str, error: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, error))
}

const PURCHASE_COLUMNS: &str = "id, user_id, product_id, status, total_amount_cents, \
     bulk_coupon_id, redeemed_bulk_coupon_id, organization_id, charge_id, created_at";

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn find_by_charge_id(&self, charge_id: &str) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE charge_id = $1"
        ))
        .bind(charge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find purchase by charge", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Purchase>, DomainError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             WHERE user_id = $1 AND product_id = $2 AND status = 'Valid' \
             ORDER BY created_at"
        ))
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list purchases", e))?;

        rows.into_iter().map(Purchase::try_from).collect()
    }

    async fn update_status(
        &self,
        id: &PurchaseId,
        status: PurchaseStatus,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE purchases SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update purchase status", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                format!("Purchase {} not found", id),
            ));
        }
        Ok(())
    }

    async fn update_organization(
        &self,
        id: &PurchaseId,
        organization_id: &OrganizationId,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE purchases SET organization_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(organization_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update purchase organization", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                format!("Purchase {} not found", id),
            ));
        }
        Ok(())
    }
}
