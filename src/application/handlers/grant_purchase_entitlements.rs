//! GrantPurchaseEntitlementsHandler - entry point for `purchase.created`.
//!
//! Resolves the desired entitlement set for the purchased product, creates
//! whatever is missing, requests community-role grants, asks for the
//! welcome email on a first grant, and runs the purchase-credit path.
//! Safe to re-run after partial success.

use std::sync::Arc;

use tracing::info;

use crate::application::coupon_credit::{CouponCreditService, CreditOutcome};
use crate::application::organizations::ensure_personal_learner;
use crate::application::reconciler::{GrantReport, Reconciler};
use crate::domain::entitlement::{EntitlementEvent, EntitlementSource};
use crate::domain::foundation::{DomainError, ErrorCode, PurchaseId, Timestamp};
use crate::domain::reconciliation::resolve;
use crate::ports::{
    EntitlementStore, EventPublisher, OrganizationRepository, PurchaseRepository, ResourceCatalog,
};

/// Command for the `purchase.created` trigger.
#[derive(Debug, Clone)]
pub struct GrantPurchaseEntitlementsCommand {
    pub purchase_id: PurchaseId,
}

/// Result of the grant workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantOutcome {
    Granted {
        report: GrantReport,
        credit: CreditOutcome,
        welcome_email_requested: bool,
    },
    /// Business-rule skip. Not an error; the workflow completed.
    Skipped { reason: String },
}

/// Handler for granting entitlements from a purchase.
pub struct GrantPurchaseEntitlementsHandler {
    purchases: Arc<dyn PurchaseRepository>,
    catalog: Arc<dyn ResourceCatalog>,
    organizations: Arc<dyn OrganizationRepository>,
    store: Arc<dyn EntitlementStore>,
    reconciler: Arc<Reconciler>,
    credits: Arc<CouponCreditService>,
    publisher: Arc<dyn EventPublisher>,
}

impl GrantPurchaseEntitlementsHandler {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        catalog: Arc<dyn ResourceCatalog>,
        organizations: Arc<dyn OrganizationRepository>,
        store: Arc<dyn EntitlementStore>,
        reconciler: Arc<Reconciler>,
        credits: Arc<CouponCreditService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            purchases,
            catalog,
            organizations,
            store,
            reconciler,
            credits,
            publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: GrantPurchaseEntitlementsCommand,
    ) -> Result<GrantOutcome, DomainError> {
        // 1. Load the purchase
        let purchase = self
            .purchases
            .find_by_id(&cmd.purchase_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PurchaseNotFound,
                    format!("Purchase {} not found", cmd.purchase_id),
                )
            })?;

        // 2. Only access-granting statuses proceed
        if !purchase.status.grants_access() {
            return Ok(GrantOutcome::Skipped {
                reason: format!("Purchase status {} does not grant access", purchase.status),
            });
        }

        // 3. Load the product; unmanaged shapes are a skip, not an error
        let product = self
            .catalog
            .get_product(&purchase.product_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ProductNotFound,
                    format!("Product {} not found", purchase.product_id),
                )
            })?;
        let Some(product_type) = product.managed_type() else {
            return Ok(GrantOutcome::Skipped {
                reason: format!("Product type {} is not managed", product.product_type),
            });
        };

        // 4. Resource tree
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

        // 5. Personal organization and learner membership come first
        let (organization, membership) =
            ensure_personal_learner(self.organizations.as_ref(), &purchase.user_id).await?;

        // 6. Resolve desired state, filtering out what is already live
        let source = EntitlementSource::Purchase(purchase.id);
        let already_granted: std::collections::HashSet<_> = self
            .store
            .live_for_user_and_source(&purchase.user_id, &source)
            .await?
            .iter()
            .map(|e| e.key())
            .collect();
        let first_grant = already_granted.is_empty();

        let desired = resolve(&product, product_type, &purchase, &context, &already_granted);

        // 7. Apply
        let report = self
            .reconciler
            .grant_desired(purchase.user_id, &desired, organization.id, membership.id)
            .await?;

        // 8. Welcome email rides on the first successful grant only
        let welcome_email_requested = first_grant && report.created > 0;
        if welcome_email_requested {
            self.publisher
                .publish(
                    EntitlementEvent::WelcomeEmailRequested {
                        user_id: purchase.user_id,
                        purchase_id: purchase.id,
                        product_id: product.id,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                )
                .await?;
        }

        // 9. Purchase credit (Valid/Restricted asymmetry lives in the service)
        let credit = self
            .credits
            .grant_purchase_credit(&purchase, organization.id, membership.id)
            .await?;

        info!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            created = report.created,
            "Granted purchase entitlements"
        );
        Ok(GrantOutcome::Granted {
            report,
            credit,
            welcome_email_requested,
        })
    }
}
