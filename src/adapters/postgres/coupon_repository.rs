//! PostgreSQL implementations of the coupon repositories.
//!
//! Both tables carry a unique constraint on their dedup key; a losing
//! concurrent insert surfaces as `InsertOutcome::Duplicate` with the
//! winner's row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::coupon::{
    Coupon, CouponKey, Discount, DiscountClass, EligibilityCondition, MerchantCoupon,
    MerchantCouponKey,
};
use crate::domain::foundation::{
    CouponId, DomainError, ErrorCode, MerchantCouponId, ProductId, Timestamp,
};
use crate::ports::{CouponRepository, InsertOutcome, MerchantCouponRepository};

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

fn db_error(context: &str, error: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, error))
}

// ════════════════════════════════════════════════════════════════════════════
// Coupons
// ════════════════════════════════════════════════════════════════════════════

/// PostgreSQL implementation of the CouponRepository port.
pub struct PostgresCouponRepository {
    pool: PgPool,
}

impl PostgresCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    merchant_coupon_id: Uuid,
    amount_discount_cents: Option<i64>,
    percent_discount: Option<i16>,
    max_uses: i32,
    restricted_to_product_id: Option<Uuid>,
    eligibility_condition: Option<JsonValue>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DomainError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount = match (row.amount_discount_cents, row.percent_discount) {
            (Some(cents), None) => Discount::AmountCents(cents),
            (None, Some(percent)) => Discount::Percent(percent as u8),
            _ => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    "Coupon row must have exactly one discount dimension",
                ))
            }
        };
        let eligibility_condition = row
            .eligibility_condition
            .map(serde_json::from_value::<EligibilityCondition>)
            .transpose()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid eligibility condition: {}", e),
                )
            })?;

        Ok(Coupon {
            id: CouponId::from_uuid(row.id),
            merchant_coupon_id: MerchantCouponId::from_uuid(row.merchant_coupon_id),
            discount,
            max_uses: row.max_uses,
            restricted_to_product_id: row.restricted_to_product_id.map(ProductId::from_uuid),
            eligibility_condition,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

const COUPON_COLUMNS: &str = "id, merchant_coupon_id, amount_discount_cents, percent_discount, \
     max_uses, restricted_to_product_id, eligibility_condition, created_at";

#[async_trait]
impl CouponRepository for PostgresCouponRepository {
    async fn find_by_key(&self, key: &CouponKey) -> Result<Option<Coupon>, DomainError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons \
             WHERE merchant_coupon_id = $1 \
               AND restricted_to_product_id IS NOT DISTINCT FROM $2 \
               AND amount_discount_cents = $3"
        ))
        .bind(key.merchant_coupon_id.as_uuid())
        .bind(key.restricted_to_product_id.map(|p| *p.as_uuid()))
        .bind(key.amount_discount_cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find coupon by key", e))?;

        row.map(Coupon::try_from).transpose()
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find coupon", e))?;

        row.map(Coupon::try_from).transpose()
    }

    async fn find_by_restriction_and_amount(
        &self,
        product_id: &ProductId,
        amount_cents: i64,
    ) -> Result<Option<Coupon>, DomainError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons \
             WHERE restricted_to_product_id = $1 AND amount_discount_cents = $2 \
             ORDER BY created_at LIMIT 1"
        ))
        .bind(product_id.as_uuid())
        .bind(amount_cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find coupon by restriction", e))?;

        row.map(Coupon::try_from).transpose()
    }

    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome<Coupon>, DomainError> {
        let (amount_cents, percent) = match coupon.discount {
            Discount::AmountCents(cents) => (Some(cents), None),
            Discount::Percent(p) => (None, Some(p as i16)),
        };
        let eligibility = coupon
            .eligibility_condition
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to serialize eligibility condition: {}", e),
                )
            })?;

        let result = sqlx::query(
            r#"
            INSERT INTO coupons (
                id, merchant_coupon_id, amount_discount_cents, percent_discount,
                max_uses, restricted_to_product_id, eligibility_condition, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(coupon.merchant_coupon_id.as_uuid())
        .bind(amount_cents)
        .bind(percent)
        .bind(coupon.max_uses)
        .bind(coupon.restricted_to_product_id.map(|p| *p.as_uuid()))
        .bind(eligibility)
        .bind(coupon.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(coupon.clone())),
            Err(e) if is_unique_violation(&e) => {
                let key = coupon.key().ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Duplicate insert for a coupon without a dedup key",
                    )
                })?;
                let winner = self.find_by_key(&key).await?.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Duplicate insert reported but no coupon row found",
                    )
                })?;
                Ok(InsertOutcome::Duplicate(winner))
            }
            Err(e) => Err(db_error("Failed to insert coupon", e)),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Merchant coupons
// ════════════════════════════════════════════════════════════════════════════

/// PostgreSQL implementation of the MerchantCouponRepository port.
pub struct PostgresMerchantCouponRepository {
    pool: PgPool,
}

impl PostgresMerchantCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MerchantCouponRow {
    id: Uuid,
    provider_discount_id: String,
    amount_discount_cents: i64,
    discount_class: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MerchantCouponRow> for MerchantCoupon {
    type Error = DomainError;

    fn try_from(row: MerchantCouponRow) -> Result<Self, Self::Error> {
        let discount_class = parse_discount_class(&row.discount_class)?;
        Ok(MerchantCoupon {
            id: MerchantCouponId::from_uuid(row.id),
            provider_discount_id: row.provider_discount_id,
            amount_discount_cents: row.amount_discount_cents,
            discount_class,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn parse_discount_class(s: &str) -> Result<DiscountClass, DomainError> {
    match s {
        "credit" => Ok(DiscountClass::Credit),
        "promotion" => Ok(DiscountClass::Promotion),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid discount_class value: {}", other),
        )),
    }
}

#[async_trait]
impl MerchantCouponRepository for PostgresMerchantCouponRepository {
    async fn find_by_key(
        &self,
        key: &MerchantCouponKey,
    ) -> Result<Option<MerchantCoupon>, DomainError> {
        let row: Option<MerchantCouponRow> = sqlx::query_as(
            "SELECT id, provider_discount_id, amount_discount_cents, discount_class, created_at \
             FROM merchant_coupons \
             WHERE amount_discount_cents = $1 AND discount_class = $2",
        )
        .bind(key.amount_discount_cents)
        .bind(key.discount_class.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find merchant coupon", e))?;

        row.map(MerchantCoupon::try_from).transpose()
    }

    async fn insert(
        &self,
        merchant_coupon: &MerchantCoupon,
    ) -> Result<InsertOutcome<MerchantCoupon>, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO merchant_coupons (
                id, provider_discount_id, amount_discount_cents, discount_class, created_at
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(merchant_coupon.id.as_uuid())
        .bind(&merchant_coupon.provider_discount_id)
        .bind(merchant_coupon.amount_discount_cents)
        .bind(merchant_coupon.discount_class.as_str())
        .bind(merchant_coupon.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(merchant_coupon.clone())),
            Err(e) if is_unique_violation(&e) => {
                let winner = self
                    .find_by_key(&merchant_coupon.key())
                    .await?
                    .ok_or_else(|| {
                        DomainError::new(
                            ErrorCode::DatabaseError,
                            "Duplicate insert reported but no merchant coupon row found",
                        )
                    })?;
                Ok(InsertOutcome::Duplicate(winner))
            }
            Err(e) => Err(db_error("Failed to insert merchant coupon", e)),
        }
    }
}
