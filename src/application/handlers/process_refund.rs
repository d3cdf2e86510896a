//! ProcessRefundHandler - entry point for `refund.processed`.
//!
//! Marks the purchase refunded and tombstones everything the purchase
//! granted. Entitlements from other sources (coupons, manual grants) are
//! untouched. Re-delivery finds nothing left to revoke.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::reconciler::Reconciler;
use crate::domain::entitlement::EntitlementSource;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::purchase::PurchaseStatus;
use crate::ports::{CommunityRoleApi, PurchaseRepository, ResourceCatalog};

#[derive(Debug, Clone)]
pub struct ProcessRefundCommand {
    /// Payment-provider charge identifier carried by the refund event.
    pub charge_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundReport {
    pub revoked: usize,
}

pub struct ProcessRefundHandler {
    purchases: Arc<dyn PurchaseRepository>,
    catalog: Arc<dyn ResourceCatalog>,
    role_api: Arc<dyn CommunityRoleApi>,
    reconciler: Arc<Reconciler>,
}

impl ProcessRefundHandler {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        catalog: Arc<dyn ResourceCatalog>,
        role_api: Arc<dyn CommunityRoleApi>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            purchases,
            catalog,
            role_api,
            reconciler,
        }
    }

    pub async fn handle(&self, cmd: ProcessRefundCommand) -> Result<RefundReport, DomainError> {
        let purchase = self
            .purchases
            .find_by_charge_id(&cmd.charge_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PurchaseNotFound,
                    format!("No purchase for charge {}", cmd.charge_id),
                )
            })?;

        self.purchases
            .update_status(&purchase.id, PurchaseStatus::Refunded)
            .await?;

        let revoked = self
            .reconciler
            .revoke_all_from_source(purchase.user_id, EntitlementSource::Purchase(purchase.id))
            .await?;

        // Community-role revocation is best effort: the entitlement rows are
        // already tombstoned, and the role API is idempotent on the far side.
        if let Some(product) = self.catalog.get_product(&purchase.product_id).await? {
            if let Some(role_id) = product.community_role_id.as_deref() {
                if let Err(error) = self.role_api.revoke_role(&purchase.user_id, role_id).await {
                    warn!(
                        purchase_id = %purchase.id,
                        user_id = %purchase.user_id,
                        role_id,
                        %error,
                        "Failed to revoke community role after refund"
                    );
                }
            }
        }

        info!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            revoked = revoked.len(),
            "Processed refund"
        );
        Ok(RefundReport {
            revoked: revoked.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{
        InMemoryEntitlementStore, InMemoryPurchaseRepository, InMemoryResourceCatalog,
        RecordingCommunityRoleApi,
    };
    use crate::domain::catalog::{Product, ProductType, ResourceContext};
    use crate::domain::entitlement::{Entitlement, EntitlementKey, EntitlementType};
    use crate::domain::foundation::{
        CouponId, MembershipId, OrganizationId, ProductId, PurchaseId, ResourceId, Timestamp,
        UserId,
    };
    use crate::domain::purchase::Purchase;
    use crate::ports::EntitlementStore;
    use serde_json::Map;

    struct Fixture {
        handler: ProcessRefundHandler,
        purchases: Arc<InMemoryPurchaseRepository>,
        catalog: Arc<InMemoryResourceCatalog>,
        store: Arc<InMemoryEntitlementStore>,
        roles: Arc<RecordingCommunityRoleApi>,
    }

    fn fixture() -> Fixture {
        let purchases = Arc::new(InMemoryPurchaseRepository::new());
        let catalog = Arc::new(InMemoryResourceCatalog::new());
        let store = Arc::new(InMemoryEntitlementStore::new());
        let roles = Arc::new(RecordingCommunityRoleApi::new());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            Arc::new(InMemoryEventBus::new()),
        ));
        Fixture {
            handler: ProcessRefundHandler::new(
                purchases.clone(),
                catalog.clone(),
                roles.clone(),
                reconciler,
            ),
            purchases,
            catalog,
            store,
            roles,
        }
    }

    fn seeded_purchase(f: &Fixture, charge_id: &str) -> Purchase {
        let product = Product {
            id: ProductId::new(),
            name: "Cohort".to_string(),
            product_type: "cohort".to_string(),
            primary_resource_id: ResourceId::new(),
            community_role_id: Some("role-1".to_string()),
        };
        f.catalog.put(
            product.clone(),
            ResourceContext {
                product_id: product.id,
                product_type: ProductType::Cohort,
                resources: vec![],
            },
        );
        let purchase = Purchase {
            id: PurchaseId::new(),
            user_id: UserId::new(),
            product_id: product.id,
            status: crate::domain::purchase::PurchaseStatus::Valid,
            total_amount_cents: 30000,
            bulk_coupon_id: None,
            redeemed_bulk_coupon_id: None,
            organization_id: None,
            charge_id: Some(charge_id.to_string()),
            created_at: Timestamp::now(),
        };
        f.purchases.put(purchase.clone());
        purchase
    }

    async fn seed_entitlement(f: &Fixture, user_id: UserId, source: EntitlementSource) {
        let key = EntitlementKey::new(user_id, source, EntitlementType::ContentAccess, None);
        let row = Entitlement::grant(key, OrganizationId::new(), MembershipId::new(), Map::new());
        f.store.insert_if_absent(&row).await.unwrap();
    }

    #[tokio::test]
    async fn refund_revokes_purchase_entitlements_only() {
        let f = fixture();
        let purchase = seeded_purchase(&f, "ch_1");
        seed_entitlement(&f, purchase.user_id, EntitlementSource::Purchase(purchase.id)).await;
        seed_entitlement(&f, purchase.user_id, EntitlementSource::Coupon(CouponId::new())).await;

        let report = f
            .handler
            .handle(ProcessRefundCommand {
                charge_id: "ch_1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(report.revoked, 1);
        assert_eq!(f.store.live_count(), 1);
        let updated = f.purchases.all_rows()[0].clone();
        assert_eq!(updated.status, crate::domain::purchase::PurchaseStatus::Refunded);
        assert_eq!(f.roles.revoked(), vec![(purchase.user_id, "role-1".to_string())]);
    }

    #[tokio::test]
    async fn redelivered_refund_revokes_nothing() {
        let f = fixture();
        let purchase = seeded_purchase(&f, "ch_2");
        seed_entitlement(&f, purchase.user_id, EntitlementSource::Purchase(purchase.id)).await;
        let cmd = ProcessRefundCommand {
            charge_id: "ch_2".to_string(),
        };

        f.handler.handle(cmd.clone()).await.unwrap();
        let second = f.handler.handle(cmd).await.unwrap();

        assert_eq!(second.revoked, 0);
        assert_eq!(f.store.live_count(), 0);
    }

    #[tokio::test]
    async fn role_revoke_failure_does_not_fail_the_refund() {
        let f = fixture();
        let purchase = seeded_purchase(&f, "ch_3");
        seed_entitlement(&f, purchase.user_id, EntitlementSource::Purchase(purchase.id)).await;
        f.roles.fail_revokes();

        let report = f
            .handler
            .handle(ProcessRefundCommand {
                charge_id: "ch_3".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(report.revoked, 1);
        assert_eq!(f.store.live_count(), 0);
    }

    #[tokio::test]
    async fn unknown_charge_is_a_terminal_error() {
        let f = fixture();

        let err = f
            .handler
            .handle(ProcessRefundCommand {
                charge_id: "ch_missing".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::PurchaseNotFound);
    }
}
