//! Purchase-credit granting.
//!
//! A purchase may entitle its buyer to an apply-credit: a coupon worth the
//! purchase price toward the same product. The two purchase statuses are
//! intentionally asymmetric:
//!
//! - `Restricted` purchases auto-create the matching coupon (merchant
//!   coupon + internal record) if it does not exist yet.
//! - `Valid` purchases only receive a credit when a coupon restricted to
//!   the product at the exact purchase price already exists. No coupon is
//!   minted for them, which avoids handing out surprise full-price credits.
//!
//! Preserve the asymmetry; do not unify the two paths.

use std::sync::Arc;

use serde_json::{json, Map};
use tracing::info;

use crate::domain::coupon::DiscountClass;
use crate::domain::entitlement::{
    Entitlement, EntitlementEvent, EntitlementKey, EntitlementSource, EntitlementType,
    META_ELIGIBILITY_PRODUCT_ID,
};
use crate::domain::foundation::{
    CouponId, DomainError, MembershipId, OrganizationId, Timestamp,
};
use crate::domain::purchase::{Purchase, PurchaseStatus};
use crate::ports::{CouponRepository, EntitlementStore, EventPublisher};

use super::discount_registry::DiscountRegistry;

/// What the credit path did for a purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditOutcome {
    /// A credit entitlement is live for the buyer (created now or earlier).
    Granted {
        coupon_id: CouponId,
        created: bool,
    },
    /// The purchase is not eligible for a credit. Not an error.
    Skipped { reason: String },
}

/// Grants purchase credits through the discount registry and the
/// entitlement store.
pub struct CouponCreditService {
    registry: Arc<DiscountRegistry>,
    coupons: Arc<dyn CouponRepository>,
    store: Arc<dyn EntitlementStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl CouponCreditService {
    pub fn new(
        registry: Arc<DiscountRegistry>,
        coupons: Arc<dyn CouponRepository>,
        store: Arc<dyn EntitlementStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            coupons,
            store,
            publisher,
        }
    }

    /// Runs the credit path for a purchase.
    ///
    /// The buyer's personal organization and learner membership must
    /// already exist; grant paths ensure this before calling.
    pub async fn grant_purchase_credit(
        &self,
        purchase: &Purchase,
        organization_id: OrganizationId,
        membership_id: MembershipId,
    ) -> Result<CreditOutcome, DomainError> {
        let coupon_id = match purchase.status {
            PurchaseStatus::Restricted => {
                let merchant = self
                    .registry
                    .find_or_create_merchant_coupon(
                        purchase.total_amount_cents,
                        DiscountClass::Credit,
                    )
                    .await?;
                let coupon = self
                    .registry
                    .find_or_create_credit_coupon(
                        merchant.id,
                        purchase.product_id,
                        purchase.total_amount_cents,
                    )
                    .await?;
                coupon.id
            }
            PurchaseStatus::Valid => {
                // Exact-price-match only; never mint a coupon here.
                match self
                    .coupons
                    .find_by_restriction_and_amount(
                        &purchase.product_id,
                        purchase.total_amount_cents,
                    )
                    .await?
                {
                    Some(coupon) => coupon.id,
                    None => {
                        return Ok(CreditOutcome::Skipped {
                            reason: "No matching credit coupon for purchase price".to_string(),
                        })
                    }
                }
            }
            PurchaseStatus::Refunded | PurchaseStatus::Pending => {
                return Ok(CreditOutcome::Skipped {
                    reason: format!(
                        "Purchase status {} is not eligible for credit",
                        purchase.status
                    ),
                })
            }
        };

        let key = EntitlementKey::new(
            purchase.user_id,
            EntitlementSource::Coupon(coupon_id),
            EntitlementType::ApplyCredit,
            None,
        );
        let mut metadata = Map::new();
        metadata.insert(
            META_ELIGIBILITY_PRODUCT_ID.to_string(),
            json!(purchase.product_id.to_string()),
        );
        let entitlement = Entitlement::grant(key, organization_id, membership_id, metadata);

        let outcome = self.store.insert_if_absent(&entitlement).await?;
        let created = outcome.was_created();
        if created {
            let row = outcome.into_inner();
            self.publisher
                .publish(
                    EntitlementEvent::Granted {
                        entitlement_id: row.id,
                        user_id: row.user_id,
                        entitlement_type: row.entitlement_type,
                        source: row.source,
                        resource_id: row.resource_id,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                )
                .await?;
            info!(
                user_id = %purchase.user_id,
                coupon_id = %coupon_id,
                "Granted purchase credit"
            );
        }

        Ok(CreditOutcome::Granted { coupon_id, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{
        InMemoryCouponRepository, InMemoryEntitlementStore, InMemoryMerchantCouponRepository,
    };
    use crate::domain::coupon::Coupon;
    use crate::domain::foundation::{MerchantCouponId, ProductId, PurchaseId, UserId};
    use crate::ports::{
        CheckoutSession, CreateDiscountRequest, PaymentError, PaymentProvider, ProviderDiscount,
    };
    use async_trait::async_trait;

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

    struct Fixture {
        service: CouponCreditService,
        coupons: Arc<InMemoryCouponRepository>,
        store: Arc<InMemoryEntitlementStore>,
        bus: Arc<InMemoryEventBus>,
    }

    fn fixture() -> Fixture {
        let coupons = Arc::new(InMemoryCouponRepository::new());
        let merchants = Arc::new(InMemoryMerchantCouponRepository::new());
        let store = Arc::new(InMemoryEntitlementStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let registry = Arc::new(DiscountRegistry::new(
            merchants,
            coupons.clone(),
            Arc::new(StubPaymentProvider),
        ));
        Fixture {
            service: CouponCreditService::new(registry, coupons.clone(), store.clone(), bus.clone()),
            coupons,
            store,
            bus,
        }
    }

    fn purchase(status: PurchaseStatus, amount: i64) -> Purchase {
        Purchase {
            id: PurchaseId::new(),
            user_id: UserId::new(),
            product_id: ProductId::new(),
            status,
            total_amount_cents: amount,
            bulk_coupon_id: None,
            redeemed_bulk_coupon_id: None,
            organization_id: None,
            charge_id: None,
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn restricted_purchase_mints_coupon_and_grants_credit() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Restricted, 30000);

        let outcome = f
            .service
            .grant_purchase_credit(&p, OrganizationId::new(), MembershipId::new())
            .await
            .unwrap();

        assert!(matches!(outcome, CreditOutcome::Granted { created: true, .. }));
        assert_eq!(f.coupons.all_rows().len(), 1);
        assert_eq!(f.store.live_count(), 1);
        assert!(f.bus.has_event("entitlement.granted.v1"));
    }

    #[tokio::test]
    async fn valid_purchase_without_matching_coupon_is_skipped() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Valid, 30000);

        let outcome = f
            .service
            .grant_purchase_credit(&p, OrganizationId::new(), MembershipId::new())
            .await
            .unwrap();

        assert!(matches!(outcome, CreditOutcome::Skipped { .. }));
        assert!(f.coupons.all_rows().is_empty());
        assert_eq!(f.store.live_count(), 0);
    }

    #[tokio::test]
    async fn valid_purchase_with_exact_price_match_gets_credit() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Valid, 30000);
        f.coupons.put(Coupon::credit(
            CouponId::new(),
            MerchantCouponId::new(),
            30000,
            p.product_id,
        ));

        let outcome = f
            .service
            .grant_purchase_credit(&p, OrganizationId::new(), MembershipId::new())
            .await
            .unwrap();

        assert!(matches!(outcome, CreditOutcome::Granted { created: true, .. }));
        assert_eq!(f.coupons.all_rows().len(), 1);
    }

    #[tokio::test]
    async fn valid_purchase_at_different_price_is_skipped() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Valid, 25000);
        f.coupons.put(Coupon::credit(
            CouponId::new(),
            MerchantCouponId::new(),
            30000,
            p.product_id,
        ));

        let outcome = f
            .service
            .grant_purchase_credit(&p, OrganizationId::new(), MembershipId::new())
            .await
            .unwrap();

        assert!(matches!(outcome, CreditOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn credit_grant_is_idempotent() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Restricted, 30000);
        let org = OrganizationId::new();
        let membership = MembershipId::new();

        let first = f
            .service
            .grant_purchase_credit(&p, org, membership)
            .await
            .unwrap();
        let second = f
            .service
            .grant_purchase_credit(&p, org, membership)
            .await
            .unwrap();

        let CreditOutcome::Granted { coupon_id: first_id, created: true } = first else {
            panic!("first call should create the credit");
        };
        let CreditOutcome::Granted { coupon_id: second_id, created: false } = second else {
            panic!("second call should find the credit live");
        };
        assert_eq!(first_id, second_id);
        assert_eq!(f.store.live_count(), 1);
        assert_eq!(f.bus.events_of_type("entitlement.granted.v1").len(), 1);
    }

    #[tokio::test]
    async fn refunded_purchase_is_skipped() {
        let f = fixture();
        let p = purchase(PurchaseStatus::Refunded, 30000);

        let outcome = f
            .service
            .grant_purchase_credit(&p, OrganizationId::new(), MembershipId::new())
            .await
            .unwrap();

        assert!(matches!(outcome, CreditOutcome::Skipped { .. }));
    }
}
