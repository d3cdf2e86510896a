//! In-memory entitlement store for tests.
//!
//! Mirrors the Postgres adapter's semantics, including the idempotency
//! uniqueness rule and atomic credit transfer, behind one mutex.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations, which panics if a lock is poisoned.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::entitlement::{
    Entitlement, EntitlementSource, EntitlementType, META_ELIGIBILITY_PRODUCT_ID,
};
use crate::domain::foundation::{
    DomainError, EntitlementId, ErrorCode, ProductId, ResourceId, UserId,
};
use crate::ports::{EntitlementStore, InsertOutcome};

/// In-memory [`EntitlementStore`].
///
/// Rows are kept forever, tombstones included, so "tombstone is not
/// deletion" is observable in tests. A key that was revoked and re-granted
/// holds two rows with the same derived id; live-row lookups prefer the
/// live one.
pub struct InMemoryEntitlementStore {
    rows: Mutex<Vec<Entitlement>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// All rows, tombstoned included (for test assertions).
    pub fn all_rows(&self) -> Vec<Entitlement> {
        self.rows
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned")
            .clone()
    }

    /// Count of live rows (for test assertions).
    pub fn live_count(&self) -> usize {
        self.all_rows().iter().filter(|e| e.is_live()).count()
    }
}

impl Default for InMemoryEntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn insert_if_absent(
        &self,
        entitlement: &Entitlement,
    ) -> Result<InsertOutcome<Entitlement>, DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned");
        if let Some(existing) = rows
            .iter()
            .find(|e| e.is_live() && e.key() == entitlement.key())
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        rows.push(entitlement.clone());
        Ok(InsertOutcome::Created(entitlement.clone()))
    }

    async fn tombstone(&self, id: &EntitlementId) -> Result<bool, DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned");
        if let Some(live) = rows.iter_mut().find(|e| &e.id == id && e.is_live()) {
            live.tombstone();
            return Ok(true);
        }
        if rows.iter().any(|e| &e.id == id) {
            return Ok(false);
        }
        Err(DomainError::new(
            ErrorCode::EntitlementNotFound,
            format!("Entitlement {} not found", id),
        ))
    }

    async fn find_by_id(&self, id: &EntitlementId) -> Result<Option<Entitlement>, DomainError> {
        let rows = self
            .rows
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned");
        let live = rows.iter().find(|e| &e.id == id && e.is_live());
        Ok(live
            .or_else(|| rows.iter().rev().find(|e| &e.id == id))
            .cloned())
    }

    async fn live_for_user(&self, user_id: &UserId) -> Result<Vec<Entitlement>, DomainError> {
        Ok(self
            .all_rows()
            .into_iter()
            .filter(|e| &e.user_id == user_id && e.is_live())
            .collect())
    }

    async fn live_for_user_and_source(
        &self,
        user_id: &UserId,
        source: &EntitlementSource,
    ) -> Result<Vec<Entitlement>, DomainError> {
        Ok(self
            .all_rows()
            .into_iter()
            .filter(|e| &e.user_id == user_id && &e.source == source && e.is_live())
            .collect())
    }

    async fn live_user_ids_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Vec<UserId>, DomainError> {
        let mut users: Vec<UserId> = self
            .all_rows()
            .into_iter()
            .filter(|e| e.resource_id.as_ref() == Some(resource_id) && e.is_live())
            .map(|e| e.user_id)
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    async fn live_credits_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Entitlement>, DomainError> {
        let product = product_id.to_string();
        Ok(self
            .all_rows()
            .into_iter()
            .filter(|e| {
                &e.user_id == user_id
                    && e.is_live()
                    && e.entitlement_type == EntitlementType::ApplyCredit
                    && e.metadata_str(META_ELIGIBILITY_PRODUCT_ID) == Some(product.as_str())
            })
            .collect())
    }

    async fn transfer_credit(
        &self,
        source_id: &EntitlementId,
        replacement: &Entitlement,
    ) -> Result<(), DomainError> {
        let mut rows = self
            .rows
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned");
        let Some(source) = rows.iter_mut().find(|e| &e.id == source_id) else {
            return Err(DomainError::new(
                ErrorCode::EntitlementNotFound,
                format!("Entitlement {} not found", source_id),
            ));
        };
        source.tombstone();
        let replacement_exists = rows
            .iter()
            .any(|e| e.is_live() && e.key() == replacement.key());
        if !replacement_exists {
            rows.push(replacement.clone());
        }
        Ok(())
    }
}
