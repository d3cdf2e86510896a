//! Source attribution for entitlements.
//!
//! Every entitlement is justified by exactly one source: the purchase,
//! coupon, or manual grant that created it. Reconciliation passes only
//! revoke entitlements whose source they own, so an unrelated coupon grant
//! survives a cohort sync untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::foundation::{CouponId, PurchaseId};

/// The kind of source that justifies an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Purchase,
    Coupon,
    Manual,
}

impl SourceType {
    /// Stable slug used in persistence and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Purchase => "purchase",
            SourceType::Coupon => "coupon",
            SourceType::Manual => "manual",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The concrete source an entitlement is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntitlementSource {
    /// Granted because of a purchase.
    Purchase(PurchaseId),
    /// Granted because a coupon was redeemed.
    Coupon(CouponId),
    /// Granted by an operator.
    Manual(Uuid),
}

impl EntitlementSource {
    /// The source type discriminant.
    pub fn source_type(&self) -> SourceType {
        match self {
            EntitlementSource::Purchase(_) => SourceType::Purchase,
            EntitlementSource::Coupon(_) => SourceType::Coupon,
            EntitlementSource::Manual(_) => SourceType::Manual,
        }
    }

    /// The id of the justifying record.
    pub fn source_id(&self) -> Uuid {
        match self {
            EntitlementSource::Purchase(id) => *id.as_uuid(),
            EntitlementSource::Coupon(id) => *id.as_uuid(),
            EntitlementSource::Manual(id) => *id,
        }
    }

    /// Reassembles a source from its persisted (type, id) pair.
    pub fn from_parts(source_type: SourceType, source_id: Uuid) -> Self {
        match source_type {
            SourceType::Purchase => {
                EntitlementSource::Purchase(PurchaseId::from_uuid(source_id))
            }
            SourceType::Coupon => EntitlementSource::Coupon(CouponId::from_uuid(source_id)),
            SourceType::Manual => EntitlementSource::Manual(source_id),
        }
    }
}

impl fmt::Display for EntitlementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type(), self.source_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_splits_into_parts_and_back() {
        let source = EntitlementSource::Purchase(PurchaseId::new());
        let rebuilt = EntitlementSource::from_parts(source.source_type(), source.source_id());
        assert_eq!(source, rebuilt);
    }

    #[test]
    fn source_types_have_stable_slugs() {
        assert_eq!(SourceType::Purchase.as_str(), "purchase");
        assert_eq!(SourceType::Coupon.as_str(), "coupon");
        assert_eq!(SourceType::Manual.as_str(), "manual");
    }
}
