//! Reconciliation diff engine.
//!
//! Pure set arithmetic over entitlement idempotency keys. Given the desired
//! set a resolver computed and the actual live set the store holds, produce
//! the minimal add/remove plan. Removal is restricted to entitlements whose
//! source type is owned by the reconciliation pass: a cohort sync must
//! never revoke entitlements sourced from an unrelated coupon.

use std::collections::HashSet;

use crate::domain::entitlement::{EntitlementKey, SourceType};

/// The minimal set of mutations that reconciles actual state to desired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub to_add: Vec<EntitlementKey>,
    pub to_remove: Vec<EntitlementKey>,
}

impl ReconcilePlan {
    /// True when applying this plan would change nothing.
    pub fn is_converged(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the reconciliation plan.
///
/// `to_add` is desired minus actual; `to_remove` is actual minus desired,
/// restricted to keys whose source type matches `owned`. Output order is
/// stable (sorted by derived entitlement id) so plans are comparable and
/// logs are reproducible.
pub fn diff(
    desired: &HashSet<EntitlementKey>,
    actual: &HashSet<EntitlementKey>,
    owned: SourceType,
) -> ReconcilePlan {
    let mut to_add: Vec<EntitlementKey> = desired.difference(actual).copied().collect();
    let mut to_remove: Vec<EntitlementKey> = actual
        .difference(desired)
        .filter(|key| key.source.source_type() == owned)
        .copied()
        .collect();

    to_add.sort_by_key(|k| *k.entitlement_id().as_uuid());
    to_remove.sort_by_key(|k| *k.entitlement_id().as_uuid());

    ReconcilePlan { to_add, to_remove }
}

/// Applies a plan to a key set, modelling what the store converges to.
///
/// Used by tests and by callers that need to predict the post-apply state
/// without a round trip.
pub fn apply_to_set(
    actual: &HashSet<EntitlementKey>,
    plan: &ReconcilePlan,
) -> HashSet<EntitlementKey> {
    let mut next = actual.clone();
    for key in &plan.to_remove {
        next.remove(key);
    }
    for key in &plan.to_add {
        next.insert(*key);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{EntitlementSource, EntitlementType};
    use crate::domain::foundation::{CouponId, PurchaseId, ResourceId, UserId};
    use proptest::prelude::*;

    fn purchase_key(user: UserId, purchase: PurchaseId, resource: ResourceId) -> EntitlementKey {
        EntitlementKey::new(
            user,
            EntitlementSource::Purchase(purchase),
            EntitlementType::ContentAccess,
            Some(resource),
        )
    }

    fn coupon_key(user: UserId, coupon: CouponId) -> EntitlementKey {
        EntitlementKey::new(
            user,
            EntitlementSource::Coupon(coupon),
            EntitlementType::ApplyCredit,
            None,
        )
    }

    #[test]
    fn adds_missing_and_removes_stale() {
        let user = UserId::new();
        let purchase = PurchaseId::new();
        let keep = purchase_key(user, purchase, ResourceId::new());
        let add = purchase_key(user, purchase, ResourceId::new());
        let stale = purchase_key(user, purchase, ResourceId::new());

        let desired: HashSet<_> = [keep, add].into_iter().collect();
        let actual: HashSet<_> = [keep, stale].into_iter().collect();

        let plan = diff(&desired, &actual, SourceType::Purchase);
        assert_eq!(plan.to_add, vec![add]);
        assert_eq!(plan.to_remove, vec![stale]);
    }

    #[test]
    fn never_removes_unowned_sources() {
        let user = UserId::new();
        let credit = coupon_key(user, CouponId::new());

        let desired = HashSet::new();
        let actual: HashSet<_> = [credit].into_iter().collect();

        let plan = diff(&desired, &actual, SourceType::Purchase);
        assert!(plan.to_remove.is_empty());
        assert!(plan.is_converged());
    }

    #[test]
    fn identical_sets_converge() {
        let user = UserId::new();
        let purchase = PurchaseId::new();
        let keys: HashSet<_> = (0..5)
            .map(|_| purchase_key(user, purchase, ResourceId::new()))
            .collect();

        let plan = diff(&keys, &keys, SourceType::Purchase);
        assert!(plan.is_converged());
    }

    #[test]
    fn apply_realizes_the_plan() {
        let user = UserId::new();
        let purchase = PurchaseId::new();
        let keep = purchase_key(user, purchase, ResourceId::new());
        let add = purchase_key(user, purchase, ResourceId::new());
        let stale = purchase_key(user, purchase, ResourceId::new());

        let desired: HashSet<_> = [keep, add].into_iter().collect();
        let actual: HashSet<_> = [keep, stale].into_iter().collect();

        let plan = diff(&desired, &actual, SourceType::Purchase);
        let next = apply_to_set(&actual, &plan);
        assert_eq!(next, desired);
    }

    #[test]
    fn plan_order_is_stable() {
        let user = UserId::new();
        let purchase = PurchaseId::new();
        let desired: HashSet<_> = (0..8)
            .map(|_| purchase_key(user, purchase, ResourceId::new()))
            .collect();

        let a = diff(&desired, &HashSet::new(), SourceType::Purchase);
        let b = diff(&desired, &HashSet::new(), SourceType::Purchase);
        assert_eq!(a.to_add, b.to_add);
    }

    // Key generator over a small pool so desired and actual overlap often.
    fn arb_key() -> impl Strategy<Value = EntitlementKey> {
        let users: Vec<UserId> = (0..3)
            .map(|i| UserId::from_uuid(uuid::Uuid::from_u128(0x1000 + i)))
            .collect();
        let purchases: Vec<PurchaseId> = (0..3)
            .map(|i| PurchaseId::from_uuid(uuid::Uuid::from_u128(0x2000 + i)))
            .collect();
        let coupons: Vec<CouponId> = (0..2)
            .map(|i| CouponId::from_uuid(uuid::Uuid::from_u128(0x3000 + i)))
            .collect();
        let resources: Vec<ResourceId> = (0..4)
            .map(|i| ResourceId::from_uuid(uuid::Uuid::from_u128(0x4000 + i)))
            .collect();

        (
            prop::sample::select(users),
            prop_oneof![
                prop::sample::select(purchases).prop_map(EntitlementSource::Purchase),
                prop::sample::select(coupons).prop_map(EntitlementSource::Coupon),
            ],
            prop_oneof![
                Just(EntitlementType::ContentAccess),
                Just(EntitlementType::CommunityRole),
                Just(EntitlementType::ApplyCredit),
            ],
            prop::option::of(prop::sample::select(resources)),
        )
            .prop_map(|(user, source, ty, resource)| EntitlementKey::new(user, source, ty, resource))
    }

    proptest! {
        // Convergence: applying the plan then diffing again changes nothing.
        #[test]
        fn reconciliation_converges(
            desired in prop::collection::hash_set(arb_key(), 0..12),
            actual in prop::collection::hash_set(arb_key(), 0..12),
        ) {
            let plan = diff(&desired, &actual, SourceType::Purchase);
            let next = apply_to_set(&actual, &plan);
            let second = diff(&desired, &next, SourceType::Purchase);
            prop_assert!(second.is_converged());
        }

        // Applying a plan twice is the same as applying it once.
        #[test]
        fn plan_application_is_idempotent(
            desired in prop::collection::hash_set(arb_key(), 0..12),
            actual in prop::collection::hash_set(arb_key(), 0..12),
        ) {
            let plan = diff(&desired, &actual, SourceType::Purchase);
            let once = apply_to_set(&actual, &plan);
            let twice = apply_to_set(&once, &plan);
            prop_assert_eq!(once, twice);
        }
    }
}
