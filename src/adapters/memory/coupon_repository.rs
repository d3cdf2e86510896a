//! In-memory coupon and merchant coupon repositories for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::coupon::{Coupon, CouponKey, MerchantCoupon, MerchantCouponKey};
use crate::domain::foundation::{CouponId, DomainError, ProductId};
use crate::ports::{CouponRepository, InsertOutcome, MerchantCouponRepository};

/// In-memory [`CouponRepository`].
pub struct InMemoryCouponRepository {
    rows: Mutex<Vec<Coupon>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// All rows (for test assertions).
    pub fn all_rows(&self) -> Vec<Coupon> {
        self.rows
            .lock()
            .expect("InMemoryCouponRepository: lock poisoned")
            .clone()
    }

    /// Seeds a coupon directly (for test setup).
    pub fn put(&self, coupon: Coupon) {
        self.rows
            .lock()
            .expect("InMemoryCouponRepository: lock poisoned")
            .push(coupon);
    }
}

impl Default for InMemoryCouponRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_key(&self, key: &CouponKey) -> Result<Option<Coupon>, DomainError> {
        Ok(self
            .all_rows()
            .into_iter()
            .find(|c| c.key().as_ref() == Some(key)))
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        Ok(self.all_rows().into_iter().find(|c| &c.id == id))
    }

    async fn find_by_restriction_and_amount(
        &self,
        product_id: &ProductId,
        amount_cents: i64,
    ) -> Result<Option<Coupon>, DomainError> {
        Ok(self.all_rows().into_iter().find(|c| {
            c.restricted_to_product_id.as_ref() == Some(product_id)
                && c.discount.amount_cents() == Some(amount_cents)
        }))
    }

    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome<Coupon>, DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryCouponRepository: lock poisoned");
        if let Some(existing) = rows
            .iter()
            .find(|c| c.key().is_some() && c.key() == coupon.key())
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        rows.push(coupon.clone());
        Ok(InsertOutcome::Created(coupon.clone()))
    }
}

/// In-memory [`MerchantCouponRepository`].
pub struct InMemoryMerchantCouponRepository {
    rows: Mutex<Vec<MerchantCoupon>>,
}

impl InMemoryMerchantCouponRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// All rows (for test assertions).
    pub fn all_rows(&self) -> Vec<MerchantCoupon> {
        self.rows
            .lock()
            .expect("InMemoryMerchantCouponRepository: lock poisoned")
            .clone()
    }
}

impl Default for InMemoryMerchantCouponRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MerchantCouponRepository for InMemoryMerchantCouponRepository {
    async fn find_by_key(
        &self,
        key: &MerchantCouponKey,
    ) -> Result<Option<MerchantCoupon>, DomainError> {
        Ok(self.all_rows().into_iter().find(|m| &m.key() == key))
    }

    async fn insert(
        &self,
        merchant_coupon: &MerchantCoupon,
    ) -> Result<InsertOutcome<MerchantCoupon>, DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryMerchantCouponRepository: lock poisoned");
        if let Some(existing) = rows.iter().find(|m| m.key() == merchant_coupon.key()) {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        rows.push(merchant_coupon.clone());
        Ok(InsertOutcome::Created(merchant_coupon.clone()))
    }
}
