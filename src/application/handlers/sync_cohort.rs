//! SyncCohortHandler - entry point for `cohort.updated`.
//!
//! Re-resolves desired state for every user holding live access to the
//! cohort and converges each of them independently. One user's failure
//! never blocks the rest; failures are collected and reported together.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::application::organizations::ensure_personal_learner;
use crate::application::reconciler::{Reconciler, UserSyncResult};
use crate::domain::catalog::{Product, ProductType, ResourceContext};
use crate::domain::entitlement::EntitlementSource;
use crate::domain::foundation::{DomainError, ErrorCode, ResourceId, UserId};
use crate::domain::reconciliation::resolve;
use crate::ports::{
    EntitlementStore, OrganizationRepository, PurchaseRepository, ResourceCatalog,
};

#[derive(Debug, Clone)]
pub struct SyncCohortCommand {
    pub cohort_id: ResourceId,
}

#[derive(Debug)]
pub enum CohortSyncOutcome {
    Completed(CohortSyncReport),
    /// Business-rule skip. Not an error; the workflow completed.
    Skipped { reason: String },
}

/// Aggregated result of a fan-out pass over a cohort's users.
#[derive(Debug, Default)]
pub struct CohortSyncReport {
    pub synced: Vec<UserSyncResult>,
    pub failed: Vec<(UserId, DomainError)>,
}

pub struct SyncCohortHandler {
    catalog: Arc<dyn ResourceCatalog>,
    store: Arc<dyn EntitlementStore>,
    purchases: Arc<dyn PurchaseRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    reconciler: Arc<Reconciler>,
    /// Upper bound on users reconciled concurrently.
    concurrency: usize,
}

impl SyncCohortHandler {
    pub fn new(
        catalog: Arc<dyn ResourceCatalog>,
        store: Arc<dyn EntitlementStore>,
        purchases: Arc<dyn PurchaseRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        reconciler: Arc<Reconciler>,
        concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            store,
            purchases,
            organizations,
            reconciler,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn handle(&self, cmd: SyncCohortCommand) -> Result<CohortSyncOutcome, DomainError> {
        let product = self
            .catalog
            .find_product_for_resource(&cmd.cohort_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ProductNotFound,
                    format!("No product owns resource {}", cmd.cohort_id),
                )
            })?;
        let Some(product_type) = product.managed_type() else {
            return Ok(CohortSyncOutcome::Skipped {
                reason: format!("Product type {} is not managed", product.product_type),
            });
        };

        let context = self
            .catalog
            .get_resource_context(&product.id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ProductNotFound,
                    format!("Resource context for product {} not found", product.id),
                )
            })?;

        let users = self
            .store
            .live_user_ids_for_resource(&cmd.cohort_id)
            .await?;
        if users.is_empty() {
            return Ok(CohortSyncOutcome::Skipped {
                reason: "Cohort has no linked users".to_string(),
            });
        }

        let results: Vec<(UserId, Result<Option<UserSyncResult>, DomainError>)> =
            stream::iter(users)
                .map(|user_id| {
                    let product = &product;
                    let context = &context;
                    async move {
                        let result = self
                            .sync_user(user_id, product, product_type, context, &cmd.cohort_id)
                            .await;
                        (user_id, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = CohortSyncReport::default();
        for (user_id, result) in results {
            match result {
                Ok(Some(synced)) => report.synced.push(synced),
                Ok(None) => {}
                Err(err) => {
                    error!(%user_id, cohort_id = %cmd.cohort_id, error = %err, "User sync failed");
                    report.failed.push((user_id, err));
                }
            }
        }

        info!(
            cohort_id = %cmd.cohort_id,
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Cohort sync completed"
        );
        Ok(CohortSyncOutcome::Completed(report))
    }

    /// Converges one user's purchase-sourced entitlements for the cohort.
    ///
    /// Returns `Ok(None)` for users whose cohort access does not come from a
    /// purchase (coupon or manual grants have nothing to re-resolve here).
    async fn sync_user(
        &self,
        user_id: UserId,
        product: &Product,
        product_type: ProductType,
        context: &ResourceContext,
        cohort_id: &ResourceId,
    ) -> Result<Option<UserSyncResult>, DomainError> {
        let rows = self.store.live_for_user(&user_id).await?;
        let Some(purchase_id) = rows.iter().find_map(|row| {
            if row.resource_id.as_ref() != Some(cohort_id) {
                return None;
            }
            match row.source {
                EntitlementSource::Purchase(id) => Some(id),
                _ => None,
            }
        }) else {
            return Ok(None);
        };

        let purchase = self
            .purchases
            .find_by_id(&purchase_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PurchaseNotFound,
                    format!("Purchase {} not found", purchase_id),
                )
            })?;

        let (organization, membership) =
            ensure_personal_learner(self.organizations.as_ref(), &user_id).await?;

        // Full desired state, no already-granted filter: the diff decides.
        let desired = resolve(product, product_type, &purchase, context, &HashSet::new());

        let result = self
            .reconciler
            .reconcile_source(
                user_id,
                EntitlementSource::Purchase(purchase.id),
                &desired,
                organization.id,
                membership.id,
            )
            .await?;
        Ok(Some(result))
    }
}
