//! Desired-state resolvers.
//!
//! Pure, side-effect-free functions that compute the set of entitlements
//! and community-role grants that *should* exist for a purchase. One
//! resolver branch per product shape, selected by pattern match on
//! `ProductType`.
//!
//! The `already_granted` filter makes the grant path safe to re-run after
//! partial success: resources covered by a live entitlement drop out of the
//! resolved set. Reconciliation passes that diff against the actual set
//! pass an empty filter instead, so the diff sees the full desired state.

use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashSet;

use crate::domain::catalog::{
    Product, ProductType, ResourceAttribution, ResourceContext, ResourceKind,
};
use crate::domain::entitlement::{
    EntitlementKey, EntitlementSource, EntitlementType, RoleTargetType, META_ATTRIBUTION,
    META_COMMUNITY_ROLE_ID, META_DAY_ONE_UNLOCK_DATE,
};
use crate::domain::foundation::ResourceId;
use crate::domain::purchase::Purchase;

/// One entitlement the resolver wants to exist, with its grant metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredEntitlement {
    pub key: EntitlementKey,
    pub metadata: Map<String, JsonValue>,
}

/// A community-role grant the resolver wants requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRoleGrant {
    pub target_type: RoleTargetType,
    pub target_id: ResourceId,
    pub role_id: String,
}

/// The resolver output: what should exist for this purchase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredEntitlementSet {
    pub entitlements: Vec<DesiredEntitlement>,
    pub role_grants: Vec<DesiredRoleGrant>,
}

impl DesiredEntitlementSet {
    /// The idempotency keys of the desired entitlements.
    pub fn keys(&self) -> HashSet<EntitlementKey> {
        self.entitlements.iter().map(|e| e.key).collect()
    }
}

/// Computes the desired entitlement set for a purchase of a managed
/// product shape.
///
/// Deterministic: equal inputs produce equal outputs, in context order.
pub fn resolve(
    product: &Product,
    product_type: ProductType,
    purchase: &Purchase,
    context: &ResourceContext,
    already_granted: &HashSet<EntitlementKey>,
) -> DesiredEntitlementSet {
    match product_type {
        ProductType::Cohort => resolve_cohort(product, purchase, context, already_granted),
        ProductType::SelfPacedModule => {
            resolve_self_paced(product, purchase, context, already_granted)
        }
        ProductType::LiveEvent => resolve_live_event(purchase, context, already_granted),
    }
}

fn source_for(purchase: &Purchase) -> EntitlementSource {
    EntitlementSource::Purchase(purchase.id)
}

fn content_key(purchase: &Purchase, resource_id: ResourceId) -> EntitlementKey {
    EntitlementKey::new(
        purchase.user_id,
        source_for(purchase),
        EntitlementType::ContentAccess,
        Some(resource_id),
    )
}

/// Cohort: content access for the cohort resource, every ordered child
/// workshop, and any standalone bonus workshops, plus one community-role
/// entitlement on the primary resource. Children carry the day-one unlock
/// date; bonuses carry their attribution so a transfer can revoke them
/// independently.
fn resolve_cohort(
    product: &Product,
    purchase: &Purchase,
    context: &ResourceContext,
    already_granted: &HashSet<EntitlementKey>,
) -> DesiredEntitlementSet {
    let mut set = DesiredEntitlementSet::default();
    let day_one = context.day_one_unlock();

    for resource in &context.resources {
        let key = content_key(purchase, resource.resource_id);
        if already_granted.contains(&key) {
            continue;
        }

        let mut metadata = Map::new();
        metadata.insert(
            META_ATTRIBUTION.to_string(),
            json!(resource.attribution.as_str()),
        );
        if resource.attribution == ResourceAttribution::Child {
            metadata.insert(
                META_DAY_ONE_UNLOCK_DATE.to_string(),
                json!(day_one.to_string()),
            );
        }
        set.entitlements.push(DesiredEntitlement { key, metadata });
    }

    if let Some(role_id) = &product.community_role_id {
        push_role_entitlement(
            &mut set,
            purchase,
            product,
            role_id,
            RoleTargetType::Cohort,
            already_granted,
        );
    }

    set
}

/// Self-paced module: content access for the module and its sections,
/// plus the module role when the product carries one.
fn resolve_self_paced(
    product: &Product,
    purchase: &Purchase,
    context: &ResourceContext,
    already_granted: &HashSet<EntitlementKey>,
) -> DesiredEntitlementSet {
    let mut set = DesiredEntitlementSet::default();

    for resource in &context.resources {
        let key = content_key(purchase, resource.resource_id);
        if already_granted.contains(&key) {
            continue;
        }

        let mut metadata = Map::new();
        metadata.insert(
            META_ATTRIBUTION.to_string(),
            json!(resource.attribution.as_str()),
        );
        set.entitlements.push(DesiredEntitlement { key, metadata });
    }

    if let Some(role_id) = &product.community_role_id {
        push_role_entitlement(
            &mut set,
            purchase,
            product,
            role_id,
            RoleTargetType::Module,
            already_granted,
        );
    }

    set
}

/// Live event: content access for the event resource only. No nested
/// resources, no community role.
fn resolve_live_event(
    purchase: &Purchase,
    context: &ResourceContext,
    already_granted: &HashSet<EntitlementKey>,
) -> DesiredEntitlementSet {
    let mut set = DesiredEntitlementSet::default();

    for resource in &context.resources {
        if resource.kind != ResourceKind::Event
            && resource.attribution != ResourceAttribution::Primary
        {
            continue;
        }
        let key = content_key(purchase, resource.resource_id);
        if already_granted.contains(&key) {
            continue;
        }
        let mut metadata = Map::new();
        metadata.insert(
            META_ATTRIBUTION.to_string(),
            json!(resource.attribution.as_str()),
        );
        set.entitlements.push(DesiredEntitlement { key, metadata });
    }

    set
}

fn push_role_entitlement(
    set: &mut DesiredEntitlementSet,
    purchase: &Purchase,
    product: &Product,
    role_id: &str,
    target_type: RoleTargetType,
    already_granted: &HashSet<EntitlementKey>,
) {
    let key = EntitlementKey::new(
        purchase.user_id,
        source_for(purchase),
        EntitlementType::CommunityRole,
        Some(product.primary_resource_id),
    );
    if !already_granted.contains(&key) {
        let mut metadata = Map::new();
        metadata.insert(META_COMMUNITY_ROLE_ID.to_string(), json!(role_id));
        set.entitlements.push(DesiredEntitlement { key, metadata });
    }
    // The role grant request rides along even when the entitlement row
    // already exists; the far side tolerates duplicate grants.
    set.role_grants.push(DesiredRoleGrant {
        target_type,
        target_id: product.primary_resource_id,
        role_id: role_id.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ResourceRef;
    use crate::domain::foundation::{ProductId, PurchaseId, Timestamp, UserId};
    use crate::domain::purchase::PurchaseStatus;

    fn cohort_product(primary: ResourceId) -> Product {
        Product {
            id: ProductId::new(),
            name: "Epic Cohort".to_string(),
            product_type: "cohort".to_string(),
            primary_resource_id: primary,
            community_role_id: Some("role-cohort-1".to_string()),
        }
    }

    fn purchase_of(product: &Product) -> Purchase {
        Purchase {
            id: PurchaseId::new(),
            user_id: UserId::new(),
            product_id: product.id,
            status: PurchaseStatus::Valid,
            total_amount_cents: 30000,
            bulk_coupon_id: None,
            redeemed_bulk_coupon_id: None,
            organization_id: None,
            charge_id: None,
            created_at: Timestamp::now(),
        }
    }

    fn cohort_context(product: &Product, workshops: u32, bonuses: u32) -> ResourceContext {
        let mut resources = vec![ResourceRef {
            resource_id: product.primary_resource_id,
            kind: ResourceKind::Cohort,
            attribution: ResourceAttribution::Primary,
            position: None,
            starts_at: None,
        }];
        for i in 0..workshops {
            resources.push(ResourceRef {
                resource_id: ResourceId::new(),
                kind: ResourceKind::Workshop,
                attribution: ResourceAttribution::Child,
                position: Some(i + 1),
                starts_at: Some(Timestamp::now().add_days(i as i64 * 7)),
            });
        }
        for _ in 0..bonuses {
            resources.push(ResourceRef {
                resource_id: ResourceId::new(),
                kind: ResourceKind::Workshop,
                attribution: ResourceAttribution::StandaloneBonus,
                position: None,
                starts_at: None,
            });
        }
        ResourceContext {
            product_id: product.id,
            product_type: ProductType::Cohort,
            resources,
        }
    }

    #[test]
    fn cohort_yields_primary_plus_children_plus_role() {
        let primary = ResourceId::new();
        let product = cohort_product(primary);
        let purchase = purchase_of(&product);
        let context = cohort_context(&product, 4, 0);

        let set = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );

        // 1 cohort + 4 workshops + 1 community role
        assert_eq!(set.entitlements.len(), 6);
        assert_eq!(set.role_grants.len(), 1);

        let role_entitlements: Vec<_> = set
            .entitlements
            .iter()
            .filter(|e| e.key.entitlement_type == EntitlementType::CommunityRole)
            .collect();
        assert_eq!(role_entitlements.len(), 1);
        assert_eq!(
            role_entitlements[0].metadata[META_COMMUNITY_ROLE_ID],
            json!("role-cohort-1")
        );
    }

    #[test]
    fn cohort_folds_standalone_bonuses_with_distinct_attribution() {
        let product = cohort_product(ResourceId::new());
        let purchase = purchase_of(&product);
        let context = cohort_context(&product, 2, 1);

        let set = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );

        let bonus: Vec<_> = set
            .entitlements
            .iter()
            .filter(|e| e.metadata.get(META_ATTRIBUTION) == Some(&json!("standalone_bonus")))
            .collect();
        assert_eq!(bonus.len(), 1);

        let children: Vec<_> = set
            .entitlements
            .iter()
            .filter(|e| e.metadata.get(META_ATTRIBUTION) == Some(&json!("cohort_child")))
            .collect();
        assert_eq!(children.len(), 2);
        for child in children {
            assert!(child.metadata.contains_key(META_DAY_ONE_UNLOCK_DATE));
        }
    }

    #[test]
    fn children_without_schedule_carry_tbd() {
        let product = cohort_product(ResourceId::new());
        let purchase = purchase_of(&product);
        let mut context = cohort_context(&product, 2, 0);
        for resource in &mut context.resources {
            resource.starts_at = None;
        }

        let set = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );

        let child = set
            .entitlements
            .iter()
            .find(|e| e.metadata.get(META_ATTRIBUTION) == Some(&json!("cohort_child")))
            .unwrap();
        assert_eq!(child.metadata[META_DAY_ONE_UNLOCK_DATE], json!("TBD"));
    }

    #[test]
    fn already_granted_resources_are_filtered() {
        let product = cohort_product(ResourceId::new());
        let purchase = purchase_of(&product);
        let context = cohort_context(&product, 3, 0);

        let full = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );
        let granted: HashSet<_> = full.keys();

        let rerun = resolve(&product, ProductType::Cohort, &purchase, &context, &granted);
        assert!(rerun.entitlements.is_empty());
        // The role grant request still rides along; the far side is
        // tolerant of duplicates.
        assert_eq!(rerun.role_grants.len(), 1);
    }

    #[test]
    fn resolver_is_deterministic() {
        let product = cohort_product(ResourceId::new());
        let purchase = purchase_of(&product);
        let context = cohort_context(&product, 3, 1);

        let a = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );
        let b = resolve(
            &product,
            ProductType::Cohort,
            &purchase,
            &context,
            &HashSet::new(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn live_event_yields_event_access_only() {
        let primary = ResourceId::new();
        let product = Product {
            id: ProductId::new(),
            name: "Launch Day".to_string(),
            product_type: "live-event".to_string(),
            primary_resource_id: primary,
            community_role_id: None,
        };
        let purchase = purchase_of(&product);
        let context = ResourceContext {
            product_id: product.id,
            product_type: ProductType::LiveEvent,
            resources: vec![ResourceRef {
                resource_id: primary,
                kind: ResourceKind::Event,
                attribution: ResourceAttribution::Primary,
                position: None,
                starts_at: Some(Timestamp::now()),
            }],
        };

        let set = resolve(
            &product,
            ProductType::LiveEvent,
            &purchase,
            &context,
            &HashSet::new(),
        );
        assert_eq!(set.entitlements.len(), 1);
        assert!(set.role_grants.is_empty());
    }
}
