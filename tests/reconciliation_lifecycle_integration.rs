//! Integration tests for the entitlement lifecycle.
//!
//! These tests run the command handlers end to end over the in-memory
//! adapters:
//! 1. A purchase grants the full desired set for its product
//! 2. Cohort changes converge every holder onto the new desired set
//! 3. Refunds revoke purchase-derived access but leave credits alone
//! 4. A transfer moves access, roles, and credits to the target user
//! 5. Every flow is safe to re-run

use std::sync::Arc;

use entitlement_engine::adapters::events::InMemoryEventBus;
use entitlement_engine::adapters::memory::{
    InMemoryCouponRepository, InMemoryEntitlementStore, InMemoryMerchantCouponRepository,
    InMemoryOrganizationRepository, InMemoryPurchaseRepository, InMemoryResourceCatalog,
    InMemoryUserDirectory, RecordingCommunityRoleApi,
};
use entitlement_engine::application::{
    CohortSyncOutcome, CouponCreditService, CreditOutcome, DiscountRegistry, GrantOutcome,
    GrantPurchaseEntitlementsCommand, GrantPurchaseEntitlementsHandler, ProcessRefundCommand,
    ProcessRefundHandler, Reconciler, SyncCohortCommand, SyncCohortHandler, TransferOutcome,
    TransferPurchaseCommand, TransferPurchaseHandler,
};
use entitlement_engine::domain::catalog::{
    Product, ProductType, ResourceAttribution, ResourceContext, ResourceKind, ResourceRef,
};
use entitlement_engine::domain::entitlement::EntitlementType;
use entitlement_engine::domain::foundation::{ProductId, PurchaseId, ResourceId, Timestamp, UserId};
use entitlement_engine::domain::purchase::{Purchase, PurchaseStatus};
use entitlement_engine::ports::{
    CheckoutSession, CreateDiscountRequest, PaymentError, PaymentProvider, ProviderDiscount,
};

use async_trait::async_trait;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct StubPaymentProvider;

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    async fn create_discount(
        &self,
        request: CreateDiscountRequest,
    ) -> Result<ProviderDiscount, PaymentError> {
        Ok(ProviderDiscount {
            id: format!("disc_{}", request.amount_off_cents),
            amount_off_cents: request.amount_off_cents,
        })
    }

    async fn get_checkout_session(
        &self,
        _session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        Ok(None)
    }
}

/// The full handler wiring over in-memory adapters, mirroring the
/// production composition in `main.rs`.
struct Engine {
    purchases: Arc<InMemoryPurchaseRepository>,
    catalog: Arc<InMemoryResourceCatalog>,
    store: Arc<InMemoryEntitlementStore>,
    users: Arc<InMemoryUserDirectory>,
    roles: Arc<RecordingCommunityRoleApi>,
    bus: Arc<InMemoryEventBus>,
    grant: GrantPurchaseEntitlementsHandler,
    refund: ProcessRefundHandler,
    sync: SyncCohortHandler,
    transfer: TransferPurchaseHandler,
}

fn engine() -> Engine {
    let purchases = Arc::new(InMemoryPurchaseRepository::new());
    let catalog = Arc::new(InMemoryResourceCatalog::new());
    let organizations = Arc::new(InMemoryOrganizationRepository::new());
    let store = Arc::new(InMemoryEntitlementStore::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    let roles = Arc::new(RecordingCommunityRoleApi::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let coupons = Arc::new(InMemoryCouponRepository::new());
    let reconciler = Arc::new(Reconciler::new(store.clone(), bus.clone()));
    let registry = Arc::new(DiscountRegistry::new(
        Arc::new(InMemoryMerchantCouponRepository::new()),
        coupons.clone(),
        Arc::new(StubPaymentProvider),
    ));
    let credits = Arc::new(CouponCreditService::new(
        registry,
        coupons.clone(),
        store.clone(),
        bus.clone(),
    ));

    Engine {
        grant: GrantPurchaseEntitlementsHandler::new(
            purchases.clone(),
            catalog.clone(),
            organizations.clone(),
            store.clone(),
            reconciler.clone(),
            credits,
            bus.clone(),
        ),
        refund: ProcessRefundHandler::new(
            purchases.clone(),
            catalog.clone(),
            roles.clone(),
            reconciler.clone(),
        ),
        sync: SyncCohortHandler::new(
            catalog.clone(),
            store.clone(),
            purchases.clone(),
            organizations.clone(),
            reconciler.clone(),
            5,
        ),
        transfer: TransferPurchaseHandler::new(
            purchases.clone(),
            users.clone(),
            catalog.clone(),
            organizations,
            store.clone(),
            roles.clone(),
            reconciler,
            bus.clone(),
        ),
        purchases,
        catalog,
        store,
        users,
        roles,
        bus,
    }
}

fn cohort_product(workshops: u32) -> (Product, ResourceContext) {
    let product = Product {
        id: ProductId::new(),
        name: "Cohort".to_string(),
        product_type: "cohort".to_string(),
        primary_resource_id: ResourceId::new(),
        community_role_id: Some("role-1".to_string()),
    };
    let context = context_with_workshops(&product, workshops);
    (product, context)
}

fn context_with_workshops(product: &Product, workshops: u32) -> ResourceContext {
    let mut resources = vec![ResourceRef {
        resource_id: product.primary_resource_id,
        kind: ResourceKind::Cohort,
        attribution: ResourceAttribution::Primary,
        position: None,
        starts_at: None,
    }];
    for position in 0..workshops {
        resources.push(ResourceRef {
            resource_id: ResourceId::new(),
            kind: ResourceKind::Workshop,
            attribution: ResourceAttribution::Child,
            position: Some(position),
            starts_at: None,
        });
    }
    ResourceContext {
        product_id: product.id,
        product_type: ProductType::Cohort,
        resources,
    }
}

fn purchase(user_id: UserId, product: &Product, status: PurchaseStatus) -> Purchase {
    Purchase {
        id: PurchaseId::new(),
        user_id,
        product_id: product.id,
        status,
        total_amount_cents: 30000,
        bulk_coupon_id: None,
        redeemed_bulk_coupon_id: None,
        organization_id: None,
        charge_id: Some(format!("ch_{}", user_id)),
        created_at: Timestamp::now(),
    }
}

async fn grant(engine: &Engine, purchase_id: PurchaseId) -> GrantOutcome {
    engine
        .grant
        .handle(GrantPurchaseEntitlementsCommand { purchase_id })
        .await
        .unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn purchase_grant_then_cohort_growth_converges() {
    let engine = engine();
    let (product, context) = cohort_product(2);
    let buyer = engine.users.add_user("buyer@example.com");
    let p = purchase(buyer, &product, PurchaseStatus::Valid);
    engine.catalog.put(product.clone(), context);
    engine.purchases.put(p.clone());

    // 1 cohort + 2 workshops + 1 community role
    let GrantOutcome::Granted { report, .. } = grant(&engine, p.id).await else {
        panic!("expected a grant");
    };
    assert_eq!(report.created, 4);

    // The cohort gains a third workshop; sync converges the holder.
    engine
        .catalog
        .put(product.clone(), context_with_workshops(&product, 3));
    let outcome = engine
        .sync
        .handle(SyncCohortCommand {
            cohort_id: product.primary_resource_id,
        })
        .await
        .unwrap();

    let CohortSyncOutcome::Completed(sync_report) = outcome else {
        panic!("expected a completed sync");
    };
    assert!(sync_report.failed.is_empty());
    assert_eq!(sync_report.synced.len(), 1);
    // Old workshops were replaced wholesale: 3 added, 2 removed.
    assert_eq!(sync_report.synced[0].added, 3);
    assert_eq!(sync_report.synced[0].removed, 2);
    assert_eq!(engine.store.live_count(), 5);
}

#[tokio::test]
async fn cohort_shrink_converges_every_holder() {
    let engine = engine();
    let (product, context) = cohort_product(3);
    engine.catalog.put(product.clone(), context);

    let mut purchase_ids = Vec::new();
    for address in ["a@example.com", "b@example.com"] {
        let user = engine.users.add_user(address);
        let p = purchase(user, &product, PurchaseStatus::Valid);
        engine.purchases.put(p.clone());
        purchase_ids.push(p.id);
    }
    for id in purchase_ids {
        grant(&engine, id).await;
    }
    assert_eq!(engine.store.live_count(), 10);

    engine
        .catalog
        .put(product.clone(), context_with_workshops(&product, 1));
    let outcome = engine
        .sync
        .handle(SyncCohortCommand {
            cohort_id: product.primary_resource_id,
        })
        .await
        .unwrap();

    let CohortSyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed sync");
    };
    assert_eq!(report.synced.len(), 2);
    // 1 cohort + 1 workshop + 1 role per user
    assert_eq!(engine.store.live_count(), 6);

    // A second pass finds nothing to do.
    let outcome = engine
        .sync
        .handle(SyncCohortCommand {
            cohort_id: product.primary_resource_id,
        })
        .await
        .unwrap();
    let CohortSyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed sync");
    };
    assert!(report.synced.iter().all(|r| r.added == 0 && r.removed == 0));
}

#[tokio::test]
async fn refund_revokes_access_but_credit_survives() {
    let engine = engine();
    let (product, context) = cohort_product(1);
    let buyer = engine.users.add_user("buyer@example.com");
    let p = purchase(buyer, &product, PurchaseStatus::Restricted);
    engine.catalog.put(product, context);
    engine.purchases.put(p.clone());

    let GrantOutcome::Granted { credit, .. } = grant(&engine, p.id).await else {
        panic!("expected a grant");
    };
    assert!(matches!(credit, CreditOutcome::Granted { created: true, .. }));
    // 3 purchase-derived + 1 coupon credit
    assert_eq!(engine.store.live_count(), 4);

    let report = engine
        .refund
        .handle(ProcessRefundCommand {
            charge_id: p.charge_id.clone().unwrap(),
        })
        .await
        .unwrap();

    assert_eq!(report.revoked, 3);
    let remaining = engine.store.all_rows();
    let live: Vec<_> = remaining.iter().filter(|e| e.is_live()).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].entitlement_type, EntitlementType::ApplyCredit);
    assert_eq!(engine.roles.revoked().len(), 1);
    assert!(engine.bus.has_event("entitlement.revoked.v1"));
}

#[tokio::test]
async fn transfer_moves_access_roles_and_credit() {
    let engine = engine();
    let (product, context) = cohort_product(2);
    let source = engine.users.add_user("source@example.com");
    let target = engine.users.add_user("target@example.com");
    let p = purchase(source, &product, PurchaseStatus::Restricted);
    engine.catalog.put(product, context);
    engine.purchases.put(p.clone());
    grant(&engine, p.id).await;
    // 4 purchase-derived + 1 credit on the source
    assert_eq!(engine.store.live_count(), 5);

    let outcome = engine
        .transfer
        .handle(TransferPurchaseCommand {
            purchase_id: p.id,
            source_user_id: source,
            target_user_id: target,
        })
        .await
        .unwrap();

    let TransferOutcome::Transferred {
        revoked,
        granted,
        credits_moved,
    } = outcome
    else {
        panic!("expected a transfer");
    };
    assert_eq!(revoked, 4);
    assert_eq!(granted, 4);
    assert_eq!(credits_moved, 1);

    let rows = engine.store.all_rows();
    assert!(rows
        .iter()
        .filter(|e| e.is_live())
        .all(|e| e.user_id == target));
    assert_eq!(rows.iter().filter(|e| e.is_live()).count(), 5);
    assert_eq!(engine.roles.revoked(), vec![(source, "role-1".to_string())]);

    // Re-running the transfer finds nothing left to move.
    let rerun = engine
        .transfer
        .handle(TransferPurchaseCommand {
            purchase_id: p.id,
            source_user_id: source,
            target_user_id: target,
        })
        .await
        .unwrap();
    assert_eq!(
        rerun,
        TransferOutcome::Transferred {
            revoked: 0,
            granted: 0,
            credits_moved: 0,
        }
    );
}

#[tokio::test]
async fn concurrent_grant_runs_converge_on_one_set() {
    let engine = Arc::new(engine());
    let (product, context) = cohort_product(3);
    let buyer = engine.users.add_user("buyer@example.com");
    let p = purchase(buyer, &product, PurchaseStatus::Valid);
    engine.catalog.put(product, context);
    engine.purchases.put(p.clone());

    let left = {
        let engine = engine.clone();
        let id = p.id;
        tokio::spawn(async move { grant(&engine, id).await })
    };
    let right = {
        let engine = engine.clone();
        let id = p.id;
        tokio::spawn(async move { grant(&engine, id).await })
    };
    left.await.unwrap();
    right.await.unwrap();

    // 1 cohort + 3 workshops + 1 role, regardless of interleaving.
    assert_eq!(engine.store.live_count(), 5);
    assert_eq!(
        engine
            .bus
            .events_of_type("user-welcome-email.requested.v1")
            .len(),
        1
    );
}
