//! In-memory purchase repository for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::{
    DomainError, ErrorCode, OrganizationId, ProductId, PurchaseId, UserId,
};
use crate::domain::purchase::{Purchase, PurchaseStatus};
use crate::ports::PurchaseRepository;

/// In-memory [`PurchaseRepository`].
pub struct InMemoryPurchaseRepository {
    rows: Mutex<Vec<Purchase>>,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Seeds a purchase, replacing any prior row with the same id (for
    /// test setup).
    pub fn put(&self, purchase: Purchase) {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryPurchaseRepository: lock poisoned");
        rows.retain(|p| p.id != purchase.id);
        rows.push(purchase);
    }

    /// All rows (for test assertions).
    pub fn all_rows(&self) -> Vec<Purchase> {
        self.rows
            .lock()
            .expect("InMemoryPurchaseRepository: lock poisoned")
            .clone()
    }
}

impl Default for InMemoryPurchaseRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        Ok(self.all_rows().into_iter().find(|p| &p.id == id))
    }

    async fn find_by_charge_id(&self, charge_id: &str) -> Result<Option<Purchase>, DomainError> {
        Ok(self
            .all_rows()
            .into_iter()
            .find(|p| p.charge_id.as_deref() == Some(charge_id)))
    }

    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Purchase>, DomainError> {
        Ok(self
            .all_rows()
            .into_iter()
            .filter(|p| {
                &p.user_id == user_id
                    && &p.product_id == product_id
                    && p.status.grants_access()
            })
            .collect())
    }

    async fn update_status(
        &self,
        id: &PurchaseId,
        status: PurchaseStatus,
    ) -> Result<(), DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryPurchaseRepository: lock poisoned");
        match rows.iter_mut().find(|p| &p.id == id) {
            Some(purchase) => {
                purchase.status = status;
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                format!("Purchase {} not found", id),
            )),
        }
    }

    async fn update_organization(
        &self,
        id: &PurchaseId,
        organization_id: &OrganizationId,
    ) -> Result<(), DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryPurchaseRepository: lock poisoned");
        match rows.iter_mut().find(|p| &p.id == id) {
            Some(purchase) => {
                purchase.organization_id = Some(*organization_id);
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PurchaseNotFound,
                format!("Purchase {} not found", id),
            )),
        }
    }
}
