//! EntitlementStore port - the only component that touches persistent
//! entitlement state.
//!
//! # Design
//!
//! - **Insert-if-absent**: the idempotency tuple's uniqueness constraint is
//!   the sole serialization point in the system. A losing concurrent insert
//!   is not an error; the store reports `Duplicate` with the winner's row.
//! - **Tombstone, not delete**: revocation writes `deleted_at`; rows stay
//!   queryable by id forever.
//! - **Atomic credit transfer**: the tombstone/create pair of a credit
//!   hand-over is one all-or-nothing write.

use async_trait::async_trait;

use crate::domain::entitlement::{Entitlement, EntitlementSource};
use crate::domain::foundation::{DomainError, EntitlementId, ProductId, ResourceId, UserId};

/// Result of an insert keyed by a uniqueness constraint.
///
/// `Duplicate` carries the existing row so a losing writer can proceed with
/// the winner's state instead of erroring.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    /// The row was created by this call.
    Created(T),
    /// A row with the same key already existed; this is it.
    Duplicate(T),
}

impl<T> InsertOutcome<T> {
    /// The row, whoever created it.
    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Created(inner) | InsertOutcome::Duplicate(inner) => inner,
        }
    }

    /// Whether this call created the row.
    pub fn was_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }
}

/// Store port for entitlement persistence.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Inserts an entitlement unless a live row with the same idempotency
    /// key exists. A tombstoned row with the same key does not block a new
    /// grant: re-granting after a revocation creates a fresh live row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert_if_absent(
        &self,
        entitlement: &Entitlement,
    ) -> Result<InsertOutcome<Entitlement>, DomainError>;

    /// Writes the tombstone on a live entitlement.
    ///
    /// Returns `true` if this call revoked the row, `false` if the row was
    /// already tombstoned (a no-op, by design).
    ///
    /// # Errors
    ///
    /// - `EntitlementNotFound` if no row with this id exists
    /// - `DatabaseError` on persistence failure
    async fn tombstone(&self, id: &EntitlementId) -> Result<bool, DomainError>;

    /// Finds an entitlement by id, tombstoned rows included.
    async fn find_by_id(&self, id: &EntitlementId) -> Result<Option<Entitlement>, DomainError>;

    /// All live entitlements held by a user.
    async fn live_for_user(&self, user_id: &UserId) -> Result<Vec<Entitlement>, DomainError>;

    /// All live entitlements a user holds from a specific source.
    ///
    /// This is the set a transfer or refund owns.
    async fn live_for_user_and_source(
        &self,
        user_id: &UserId,
        source: &EntitlementSource,
    ) -> Result<Vec<Entitlement>, DomainError>;

    /// Distinct users holding a live entitlement for a resource.
    ///
    /// Drives cohort fan-out: these are the users a cohort-level change
    /// must reconcile.
    async fn live_user_ids_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Vec<UserId>, DomainError>;

    /// Live apply-credit entitlements whose metadata ties them to the given
    /// product (`eligibilityProductId`).
    async fn live_credits_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Vec<Entitlement>, DomainError>;

    /// Tombstones `source_id` and inserts `replacement` in a single
    /// all-or-nothing write. Both happen or neither does.
    ///
    /// Used by the transfer saga's coupon-credit carry-over.
    ///
    /// # Errors
    ///
    /// - `EntitlementNotFound` if the source row does not exist
    /// - `DatabaseError` on persistence failure
    async fn transfer_credit(
        &self,
        source_id: &EntitlementId,
        replacement: &Entitlement,
    ) -> Result<(), DomainError>;
}
