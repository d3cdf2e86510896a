//! Repository ports for coupons and merchant coupons.
//!
//! Both repositories expose find-by-key plus an insert that signals a lost
//! race instead of erroring: the unique constraint on the lookup key makes
//! a losing concurrent insert detectable, and the caller re-reads and
//! proceeds with the winner's row.

use async_trait::async_trait;

use crate::domain::coupon::{Coupon, CouponKey, MerchantCoupon, MerchantCouponKey};
use crate::domain::foundation::{CouponId, DomainError, ProductId};

use super::InsertOutcome;

/// Repository port for internal coupon records.
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Finds a coupon by its dedup key.
    async fn find_by_key(&self, key: &CouponKey) -> Result<Option<Coupon>, DomainError>;

    /// Finds a coupon by id.
    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError>;

    /// Finds a product-restricted amount coupon, regardless of which
    /// merchant coupon backs it. This is the exact-price-match lookup the
    /// Valid-purchase credit path uses.
    async fn find_by_restriction_and_amount(
        &self,
        product_id: &ProductId,
        amount_cents: i64,
    ) -> Result<Option<Coupon>, DomainError>;

    /// Inserts a coupon. On a unique-key collision, returns `Duplicate`
    /// with the existing row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome<Coupon>, DomainError>;
}

/// Repository port for merchant coupon mirrors.
#[async_trait]
pub trait MerchantCouponRepository: Send + Sync {
    /// Finds a merchant coupon by its `(amount, discount class)` key.
    async fn find_by_key(
        &self,
        key: &MerchantCouponKey,
    ) -> Result<Option<MerchantCoupon>, DomainError>;

    /// Inserts a merchant coupon. On a unique-key collision, returns
    /// `Duplicate` with the existing row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(
        &self,
        merchant_coupon: &MerchantCoupon,
    ) -> Result<InsertOutcome<MerchantCoupon>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repositories_are_object_safe() {
        fn _coupons(_repo: &dyn CouponRepository) {}
        fn _merchant(_repo: &dyn MerchantCouponRepository) {}
    }
}
