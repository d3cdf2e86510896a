//! TransferPurchaseHandler - moves a purchase between users.
//!
//! Support-operator command. Reassigns the purchase, tombstones the source
//! user's purchase-sourced entitlements, grants the full resolved set to the
//! target, and carries purchase credits across atomically. The saga recovers
//! forward: a re-run after a partial failure completes the remaining steps.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::application::organizations::ensure_personal_learner;
use crate::application::reconciler::Reconciler;
use crate::domain::entitlement::{EntitlementEvent, EntitlementSource};
use crate::domain::foundation::{DomainError, ErrorCode, PurchaseId, Timestamp, UserId};
use crate::domain::purchase::Purchase;
use crate::domain::reconciliation::resolve;
use crate::ports::{
    CommunityRoleApi, EntitlementStore, EventPublisher, OrganizationRepository,
    PurchaseRepository, ResourceCatalog, UserDirectory,
};

#[derive(Debug, Clone)]
pub struct TransferPurchaseCommand {
    pub purchase_id: PurchaseId,
    pub source_user_id: UserId,
    pub target_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Transferred {
        revoked: usize,
        granted: usize,
        credits_moved: usize,
    },
    /// The product's shape does not support transfer. Nothing was mutated.
    NotTransferable { message: String },
}

pub struct TransferPurchaseHandler {
    purchases: Arc<dyn PurchaseRepository>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ResourceCatalog>,
    organizations: Arc<dyn OrganizationRepository>,
    store: Arc<dyn EntitlementStore>,
    role_api: Arc<dyn CommunityRoleApi>,
    reconciler: Arc<Reconciler>,
    publisher: Arc<dyn EventPublisher>,
}

impl TransferPurchaseHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn ResourceCatalog>,
        organizations: Arc<dyn OrganizationRepository>,
        store: Arc<dyn EntitlementStore>,
        role_api: Arc<dyn CommunityRoleApi>,
        reconciler: Arc<Reconciler>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            purchases,
            users,
            catalog,
            organizations,
            store,
            role_api,
            reconciler,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: TransferPurchaseCommand) -> Result<TransferOutcome, DomainError> {
        // 1. Preconditions, all checked before any mutation
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

        if purchase.is_bulk() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Bulk purchases cannot be transferred; transfer the redeemed seats instead",
            ));
        }
        if cmd.source_user_id == cmd.target_user_id {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Source and target user must differ",
            ));
        }
        for user_id in [&cmd.source_user_id, &cmd.target_user_id] {
            if self.users.find_user(user_id).await?.is_none() {
                return Err(DomainError::new(
                    ErrorCode::UserNotFound,
                    format!("User {user_id} not found"),
                ));
            }
        }

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
        let Some(product_type) = product.managed_type().filter(|t| t.is_transferable()) else {
            return Ok(TransferOutcome::NotTransferable {
                message: format!(
                    "Product type {} does not support transfer",
                    product.product_type
                ),
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

        // 2. Reassign the purchase to the target's personal organization
        let (target_org, target_membership) =
            ensure_personal_learner(self.organizations.as_ref(), &cmd.target_user_id).await?;
        self.purchases
            .update_organization(&purchase.id, &target_org.id)
            .await?;

        // Source org may be missing for legacy accounts; heal it so the
        // revoke side has a consistent picture.
        ensure_personal_learner(self.organizations.as_ref(), &cmd.source_user_id).await?;

        // 3. Revoke the source user's purchase-sourced entitlements
        let source = EntitlementSource::Purchase(purchase.id);
        let revoked = self
            .reconciler
            .revoke_all_from_source(cmd.source_user_id, source)
            .await?;

        // Role regrant to the target flows through the event bus below;
        // the source-side removal is a direct, best-effort call.
        if let Some(role_id) = product.community_role_id.as_deref() {
            if let Err(error) = self.role_api.revoke_role(&cmd.source_user_id, role_id).await {
                warn!(
                    purchase_id = %purchase.id,
                    user_id = %cmd.source_user_id,
                    role_id,
                    %error,
                    "Failed to revoke community role during transfer"
                );
            }
        }

        // 4. Grant the full resolved set to the target
        let target_purchase = Purchase {
            user_id: cmd.target_user_id,
            organization_id: Some(target_org.id),
            ..purchase.clone()
        };
        let already_granted: HashSet<_> = self
            .store
            .live_for_user_and_source(&cmd.target_user_id, &source)
            .await?
            .iter()
            .map(|e| e.key())
            .collect();
        let desired = resolve(
            &product,
            product_type,
            &target_purchase,
            &context,
            &already_granted,
        );
        let report = self
            .reconciler
            .grant_desired(
                cmd.target_user_id,
                &desired,
                target_org.id,
                target_membership.id,
            )
            .await?;

        // 5. Carry purchase credits across
        let credits = self
            .store
            .live_credits_for_user_product(&cmd.source_user_id, &purchase.product_id)
            .await?;
        let mut credits_moved = 0;
        for credit in &credits {
            let replacement =
                credit.regrant_to(cmd.target_user_id, target_org.id, target_membership.id);
            self.store.transfer_credit(&credit.id, &replacement).await?;
            self.publisher
                .publish_all(vec![
                    EntitlementEvent::Revoked {
                        entitlement_id: credit.id,
                        user_id: credit.user_id,
                        entitlement_type: credit.entitlement_type,
                        source: credit.source,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                    EntitlementEvent::Granted {
                        entitlement_id: replacement.id,
                        user_id: replacement.user_id,
                        entitlement_type: replacement.entitlement_type,
                        source: replacement.source,
                        resource_id: replacement.resource_id,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                ])
                .await?;
            credits_moved += 1;
        }

        info!(
            purchase_id = %purchase.id,
            source_user_id = %cmd.source_user_id,
            target_user_id = %cmd.target_user_id,
            revoked = revoked.len(),
            granted = report.created,
            credits_moved,
            "Transferred purchase"
        );
        Ok(TransferOutcome::Transferred {
            revoked: revoked.len(),
            granted: report.created,
            credits_moved,
        })
    }
}
