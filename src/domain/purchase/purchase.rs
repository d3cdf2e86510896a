//! Purchase records.
//!
//! Purchases are immutable once created except for `status` and
//! `organization_id` (the latter moves during a transfer). They are owned
//! by an upstream commerce system; the engine reads them to justify
//! entitlements and mutates only those two fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    CouponId, DomainError, ErrorCode, OrganizationId, ProductId, PurchaseId, Timestamp, UserId,
};

/// Purchase lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseStatus {
    /// Paid in full at the offered price.
    Valid,
    /// Purchased under a regional/parity restriction (discounted, limited).
    Restricted,
    /// Money returned; access must be revoked.
    Refunded,
    /// Checkout started but not settled.
    Pending,
}

impl PurchaseStatus {
    /// Stable slug used in persistence and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Valid => "Valid",
            PurchaseStatus::Restricted => "Restricted",
            PurchaseStatus::Refunded => "Refunded",
            PurchaseStatus::Pending => "Pending",
        }
    }

    /// Whether this status justifies live entitlements.
    pub fn grants_access(&self) -> bool {
        matches!(self, PurchaseStatus::Valid | PurchaseStatus::Restricted)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Valid" => Ok(PurchaseStatus::Valid),
            "Restricted" => Ok(PurchaseStatus::Restricted),
            "Refunded" => Ok(PurchaseStatus::Refunded),
            "Pending" => Ok(PurchaseStatus::Pending),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unknown purchase status: {}", other),
            )),
        }
    }
}

/// A purchase of a product by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub status: PurchaseStatus,

    /// Amount paid, in cents.
    pub total_amount_cents: i64,

    /// Set when this is a team/bulk purchase whose seats are redeemed via
    /// a bulk coupon.
    pub bulk_coupon_id: Option<CouponId>,

    /// Set when this purchase resulted from redeeming a bulk seat.
    pub redeemed_bulk_coupon_id: Option<CouponId>,

    /// Organization that currently owns the purchase. Moves to the target
    /// user's personal organization during a transfer.
    pub organization_id: Option<OrganizationId>,

    /// Payment-provider charge identifier, used to resolve refunds.
    pub charge_id: Option<String>,

    pub created_at: Timestamp,
}

impl Purchase {
    /// Whether this is a team/bulk purchase.
    ///
    /// Bulk purchases are not transferable - individual seats are, once
    /// redeemed into their own purchases.
    pub fn is_bulk(&self) -> bool {
        self.bulk_coupon_id.is_some()
    }

    /// Whether this purchase came from redeeming a bulk seat.
    pub fn is_redeemed_seat(&self) -> bool {
        self.redeemed_bulk_coupon_id.is_some()
    }
}
