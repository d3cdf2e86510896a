//! PurchaseRepository port - read and mutate purchase records.
//!
//! Purchases are created upstream by the checkout pipeline; this engine
//! only reads them and flips the two fields it owns, status and owning
//! organization.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrganizationId, ProductId, PurchaseId, UserId};
use crate::domain::purchase::{Purchase, PurchaseStatus};

/// Repository port for purchase records.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Finds a purchase by id.
    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError>;

    /// Finds the purchase behind a payment-provider charge.
    ///
    /// Refund notifications carry only the charge id.
    async fn find_by_charge_id(&self, charge_id: &str) -> Result<Option<Purchase>, DomainError>;

    /// All access-granting purchases a user holds for a product.
    ///
    /// Backs coupon eligibility checks.
    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Purchase>, DomainError>;

    /// Sets the purchase status.
    ///
    /// # Errors
    ///
    /// - `PurchaseNotFound` if no row with this id exists
    /// - `DatabaseError` on persistence failure
    async fn update_status(
        &self,
        id: &PurchaseId,
        status: PurchaseStatus,
    ) -> Result<(), DomainError>;

    /// Moves the purchase to a different owning organization.
    ///
    /// The transfer saga points the purchase at the target user's personal
    /// organization.
    ///
    /// # Errors
    ///
    /// - `PurchaseNotFound` if no row with this id exists
    /// - `DatabaseError` on persistence failure
    async fn update_organization(
        &self,
        id: &PurchaseId,
        organization_id: &OrganizationId,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PurchaseRepository) {}
    }
}
