//! Coupon domain - internal discount rules and their payment-provider
//! mirrors.

mod coupon;
mod eligibility;
mod merchant_coupon;

pub use coupon::{Coupon, CouponKey, Discount};
pub use eligibility::EligibilityCondition;
pub use merchant_coupon::{DiscountClass, MerchantCoupon, MerchantCouponKey};
