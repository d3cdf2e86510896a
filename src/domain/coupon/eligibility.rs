//! Eligibility conditions for coupon-backed credits.
//!
//! A structured predicate over purchase state. The discount registry stores
//! these verbatim; only the desired-state resolvers evaluate them when
//! computing which users should receive an associated credit.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ProductId;
use crate::domain::purchase::{Purchase, PurchaseStatus};

/// Structured predicate gating credit eligibility.
///
/// Currently a single variant; kept as an enum so new predicates extend the
/// match sites instead of a stringly-typed rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EligibilityCondition {
    /// The user holds a valid (non-refunded, non-restricted) purchase of
    /// the given product.
    #[serde(rename_all = "camelCase")]
    HasValidProductPurchase { product_id: ProductId },
}

impl EligibilityCondition {
    /// Evaluates the predicate against a user's purchases.
    pub fn is_satisfied_by(&self, purchases: &[Purchase]) -> bool {
        match self {
            EligibilityCondition::HasValidProductPurchase { product_id } => purchases
                .iter()
                .any(|p| p.product_id == *product_id && p.status == PurchaseStatus::Valid),
        }
    }
}
