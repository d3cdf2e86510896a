//! RedeemCouponHandler - entry point for `coupon.redeemed`.
//!
//! A redeemed credit coupon becomes an apply-credit entitlement for the
//! redeeming user. Re-delivery of the same redemption is a no-op.

use std::sync::Arc;

use serde_json::{json, Map};
use tracing::info;

use crate::application::organizations::ensure_personal_learner;
use crate::domain::entitlement::{
    Entitlement, EntitlementEvent, EntitlementKey, EntitlementSource, EntitlementType,
    META_ELIGIBILITY_PRODUCT_ID,
};
use crate::domain::foundation::{CouponId, DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CouponRepository, EntitlementStore, EventPublisher, OrganizationRepository};

#[derive(Debug, Clone)]
pub struct RedeemCouponCommand {
    pub coupon_id: CouponId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    /// A credit entitlement is live for the user.
    Redeemed { created: bool },
}

pub struct RedeemCouponHandler {
    coupons: Arc<dyn CouponRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    store: Arc<dyn EntitlementStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl RedeemCouponHandler {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        store: Arc<dyn EntitlementStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            coupons,
            organizations,
            store,
            publisher,
        }
    }

    pub async fn handle(&self, cmd: RedeemCouponCommand) -> Result<RedeemOutcome, DomainError> {
        let coupon = self
            .coupons
            .find_by_id(&cmd.coupon_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::CouponNotFound,
                    format!("Coupon {} not found", cmd.coupon_id),
                )
            })?;

        let (organization, membership) =
            ensure_personal_learner(self.organizations.as_ref(), &cmd.user_id).await?;

        let key = EntitlementKey::new(
            cmd.user_id,
            EntitlementSource::Coupon(coupon.id),
            EntitlementType::ApplyCredit,
            None,
        );
        let mut metadata = Map::new();
        if let Some(product_id) = coupon.restricted_to_product_id {
            metadata.insert(
                META_ELIGIBILITY_PRODUCT_ID.to_string(),
                json!(product_id.to_string()),
            );
        }
        let entitlement = Entitlement::grant(key, organization.id, membership.id, metadata);

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
                user_id = %cmd.user_id,
                coupon_id = %cmd.coupon_id,
                "Granted credit entitlement from coupon redemption"
            );
        }

        Ok(RedeemOutcome::Redeemed { created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{
        InMemoryCouponRepository, InMemoryEntitlementStore, InMemoryOrganizationRepository,
    };
    use crate::domain::coupon::Coupon;
    use crate::domain::foundation::{MerchantCouponId, ProductId};

    struct Fixture {
        handler: RedeemCouponHandler,
        coupons: Arc<InMemoryCouponRepository>,
        store: Arc<InMemoryEntitlementStore>,
        bus: Arc<InMemoryEventBus>,
    }

    fn fixture() -> Fixture {
        let coupons = Arc::new(InMemoryCouponRepository::new());
        let store = Arc::new(InMemoryEntitlementStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        Fixture {
            handler: RedeemCouponHandler::new(
                coupons.clone(),
                Arc::new(InMemoryOrganizationRepository::new()),
                store.clone(),
                bus.clone(),
            ),
            coupons,
            store,
            bus,
        }
    }

    fn credit_coupon() -> Coupon {
        Coupon::credit(
            CouponId::new(),
            MerchantCouponId::new(),
            15000,
            ProductId::new(),
        )
    }

    #[tokio::test]
    async fn redemption_grants_a_credit_entitlement() {
        let f = fixture();
        let coupon = credit_coupon();
        f.coupons.put(coupon.clone());

        let outcome = f
            .handler
            .handle(RedeemCouponCommand {
                coupon_id: coupon.id,
                user_id: UserId::new(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, RedeemOutcome::Redeemed { created: true });
        assert_eq!(f.store.live_count(), 1);
        assert!(f.bus.has_event("entitlement.granted.v1"));
        let row = &f.store.all_rows()[0];
        assert_eq!(row.entitlement_type, EntitlementType::ApplyCredit);
        assert!(row.metadata_str(META_ELIGIBILITY_PRODUCT_ID).is_some());
    }

    #[tokio::test]
    async fn redelivered_redemption_is_a_no_op() {
        let f = fixture();
        let coupon = credit_coupon();
        f.coupons.put(coupon.clone());
        let cmd = RedeemCouponCommand {
            coupon_id: coupon.id,
            user_id: UserId::new(),
        };

        f.handler.handle(cmd.clone()).await.unwrap();
        let second = f.handler.handle(cmd).await.unwrap();

        assert_eq!(second, RedeemOutcome::Redeemed { created: false });
        assert_eq!(f.store.live_count(), 1);
        assert_eq!(f.bus.events_of_type("entitlement.granted.v1").len(), 1);
    }

    #[tokio::test]
    async fn unknown_coupon_is_a_terminal_error() {
        let f = fixture();

        let err = f
            .handler
            .handle(RedeemCouponCommand {
                coupon_id: CouponId::new(),
                user_id: UserId::new(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::CouponNotFound);
        assert!(!err.is_retriable());
    }
}
