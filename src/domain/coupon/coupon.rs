//! Internal coupon records.
//!
//! A Coupon is an internally-defined discount rule backed by a deduplicated
//! merchant coupon (the payment-provider-side discount object). Coupons are
//! created lazily the first time a given discount amount is needed for a
//! given product restriction and reused thereafter.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CouponId, MerchantCouponId, ProductId, Timestamp, ValidationError,
};

use super::EligibilityCondition;

/// The discount a coupon applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discount {
    /// A fixed amount off, in cents.
    AmountCents(i64),
    /// A percentage off, 1-100.
    Percent(u8),
}

impl Discount {
    /// Validates the discount value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Discount::AmountCents(cents) if *cents <= 0 => {
                Err(ValidationError::non_positive_amount("amount_discount", *cents))
            }
            Discount::Percent(pct) if *pct == 0 || *pct > 100 => Err(
                ValidationError::invalid_format("percentage_discount", "must be 1-100"),
            ),
            _ => Ok(()),
        }
    }

    /// The amount in cents, when this is an amount discount.
    pub fn amount_cents(&self) -> Option<i64> {
        match self {
            Discount::AmountCents(cents) => Some(*cents),
            Discount::Percent(_) => None,
        }
    }
}

/// Uniqueness key for internal coupons.
///
/// At most one Coupon exists per distinct key; the registry's
/// find-or-create enforces this through a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponKey {
    pub merchant_coupon_id: MerchantCouponId,
    pub restricted_to_product_id: Option<ProductId>,
    pub amount_discount_cents: i64,
}

/// An internally-defined discount rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,

    /// The deduplicated payment-provider discount object backing this rule.
    pub merchant_coupon_id: MerchantCouponId,

    /// What the coupon takes off.
    pub discount: Discount,

    /// Maximum redemptions; -1 means unlimited.
    pub max_uses: i32,

    /// Restricts redemption to a single product, if set.
    pub restricted_to_product_id: Option<ProductId>,

    /// Structured predicate gating who may receive an associated credit.
    /// Stored here, evaluated by the resolvers - never by the registry.
    pub eligibility_condition: Option<EligibilityCondition>,

    pub created_at: Timestamp,
}

impl Coupon {
    /// Creates a product-restricted credit coupon for an exact amount.
    ///
    /// This is the shape the coupon-credit path mints: single use, tied to
    /// the product the credit is eligible toward.
    pub fn credit(
        id: CouponId,
        merchant_coupon_id: MerchantCouponId,
        amount_cents: i64,
        product_id: ProductId,
    ) -> Self {
        Self {
            id,
            merchant_coupon_id,
            discount: Discount::AmountCents(amount_cents),
            max_uses: 1,
            restricted_to_product_id: Some(product_id),
            eligibility_condition: Some(EligibilityCondition::HasValidProductPurchase {
                product_id,
            }),
            created_at: Timestamp::now(),
        }
    }

    /// The uniqueness key for this coupon, when it carries an amount
    /// discount. Percentage coupons are never minted by the credit path and
    /// have no dedup key.
    pub fn key(&self) -> Option<CouponKey> {
        self.discount.amount_cents().map(|cents| CouponKey {
            merchant_coupon_id: self.merchant_coupon_id,
            restricted_to_product_id: self.restricted_to_product_id,
            amount_discount_cents: cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_coupon_is_single_use_and_restricted() {
        let product = ProductId::new();
        let coupon = Coupon::credit(CouponId::new(), MerchantCouponId::new(), 30000, product);

        assert_eq!(coupon.max_uses, 1);
        assert_eq!(coupon.restricted_to_product_id, Some(product));
        assert_eq!(coupon.discount, Discount::AmountCents(30000));
        assert!(matches!(
            coupon.eligibility_condition,
            Some(EligibilityCondition::HasValidProductPurchase { product_id }) if product_id == product
        ));
    }

    #[test]
    fn credit_coupon_has_a_dedup_key() {
        let coupon = Coupon::credit(
            CouponId::new(),
            MerchantCouponId::new(),
            30000,
            ProductId::new(),
        );
        let key = coupon.key().unwrap();
        assert_eq!(key.amount_discount_cents, 30000);
        assert_eq!(key.merchant_coupon_id, coupon.merchant_coupon_id);
    }

    #[test]
    fn zero_amount_discount_is_invalid() {
        assert!(Discount::AmountCents(0).validate().is_err());
        assert!(Discount::AmountCents(-100).validate().is_err());
        assert!(Discount::AmountCents(100).validate().is_ok());
    }

    #[test]
    fn percent_discount_bounds() {
        assert!(Discount::Percent(0).validate().is_err());
        assert!(Discount::Percent(101).validate().is_err());
        assert!(Discount::Percent(100).validate().is_ok());
    }
}
