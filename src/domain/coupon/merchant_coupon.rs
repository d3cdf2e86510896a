//! Merchant coupon records - mirrors of payment-provider discount objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{MerchantCouponId, Timestamp};

/// Classification of a merchant coupon, part of its dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountClass {
    /// A purchase credit carried over from a prior purchase.
    Credit,
    /// A promotional discount.
    Promotion,
}

impl DiscountClass {
    /// Stable slug used in persistence and provider metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountClass::Credit => "credit",
            DiscountClass::Promotion => "promotion",
        }
    }
}

impl fmt::Display for DiscountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dedup key for merchant coupons: at most one live record per key.
///
/// Creation requires a network call to the payment provider, so the
/// registry looks this key up before creating - never create-then-reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerchantCouponKey {
    pub amount_discount_cents: i64,
    pub discount_class: DiscountClass,
}

/// A record mirroring a payment-provider-side discount object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCoupon {
    pub id: MerchantCouponId,

    /// Identifier of the discount object at the payment provider.
    pub provider_discount_id: String,

    pub amount_discount_cents: i64,

    pub discount_class: DiscountClass,

    pub created_at: Timestamp,
}

impl MerchantCoupon {
    pub fn new(
        id: MerchantCouponId,
        provider_discount_id: impl Into<String>,
        amount_discount_cents: i64,
        discount_class: DiscountClass,
    ) -> Self {
        Self {
            id,
            provider_discount_id: provider_discount_id.into(),
            amount_discount_cents,
            discount_class,
            created_at: Timestamp::now(),
        }
    }

    /// The dedup key of this record.
    pub fn key(&self) -> MerchantCouponKey {
        MerchantCouponKey {
            amount_discount_cents: self.amount_discount_cents,
            discount_class: self.discount_class,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_amount_plus_class() {
        let coupon = MerchantCoupon::new(
            MerchantCouponId::new(),
            "disc_abc",
            50000,
            DiscountClass::Credit,
        );
        let key = coupon.key();
        assert_eq!(key.amount_discount_cents, 50000);
        assert_eq!(key.discount_class, DiscountClass::Credit);
    }

    #[test]
    fn discount_class_slugs() {
        assert_eq!(DiscountClass::Credit.as_str(), "credit");
        assert_eq!(DiscountClass::Promotion.as_str(), "promotion");
    }
}
