//! Entitlement aggregate entity.
//!
//! An Entitlement is the unit of access: one user's right to one resource
//! (or one credit), attributable to exactly one source. Entitlements are
//! never hard-deleted; revocation writes a tombstone (`deleted_at`) so the
//! row stays queryable by id and re-runs of any grant path converge.
//!
//! # Design Decisions
//!
//! - **Deterministic ids**: the id is a UUIDv5 over the grant key, so two
//!   racing grant attempts for the same key produce the same row.
//! - **Tombstone, not delete**: `deleted_at` removes the row from "live"
//!   consideration without destroying history.
//! - **Open metadata**: source-specific context (`eligibilityProductId`,
//!   `communityRoleId`, `dayOneUnlockDate`) lives in a schema-less map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::domain::foundation::{
    EntitlementId, MembershipId, OrganizationId, ResourceId, Timestamp, UserId,
};

use super::{EntitlementSource, EntitlementType};

/// Namespace for deriving entitlement ids from grant keys.
const ENTITLEMENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x2f1d_8a40_93c5_4b7e_a6d1_50c2_7e49_b318);

/// Metadata key: product a credit is eligible toward.
pub const META_ELIGIBILITY_PRODUCT_ID: &str = "eligibilityProductId";
/// Metadata key: community-platform role the entitlement maps to.
pub const META_COMMUNITY_ROLE_ID: &str = "communityRoleId";
/// Metadata key: day-one unlock date for cohort children ("TBD" if unknown).
pub const META_DAY_ONE_UNLOCK_DATE: &str = "dayOneUnlockDate";
/// Metadata key: how a resource entered the desired set
/// ("cohort_child" vs "standalone_bonus"), so bonus grants revoke
/// independently during a transfer.
pub const META_ATTRIBUTION: &str = "attribution";

/// The idempotency key for grants.
///
/// At most one live entitlement may exist per key. The resource dimension
/// is part of the key because a single purchase yields one content-access
/// entitlement per unlocked resource; credits and roles without a resource
/// use `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitlementKey {
    pub user_id: UserId,
    pub source: EntitlementSource,
    pub entitlement_type: EntitlementType,
    pub resource_id: Option<ResourceId>,
}

impl EntitlementKey {
    pub fn new(
        user_id: UserId,
        source: EntitlementSource,
        entitlement_type: EntitlementType,
        resource_id: Option<ResourceId>,
    ) -> Self {
        Self {
            user_id,
            source,
            entitlement_type,
            resource_id,
        }
    }

    /// Derives the stable entitlement id for this key.
    ///
    /// UUIDv5 over the canonical key string: equal keys always map to the
    /// same id, which is what makes repeated grant attempts naturally
    /// deduplicated.
    pub fn entitlement_id(&self) -> EntitlementId {
        let canonical = format!(
            "{}|{}|{}|{}",
            self.user_id,
            self.source,
            self.entitlement_type,
            self.resource_id
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        EntitlementId::from_uuid(Uuid::new_v5(&ENTITLEMENT_ID_NAMESPACE, canonical.as_bytes()))
    }
}

/// Entitlement aggregate - one user's access right to one resource.
///
/// # Invariants
///
/// - `id` is the UUIDv5 of `key()`
/// - at most one live (non-tombstoned) entitlement per `EntitlementKey`
/// - the owning user holds a `learner` organization membership before any
///   entitlement is attached (enforced by the grant paths, not here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Stable identifier derived from the grant key.
    pub id: EntitlementId,

    /// User who holds this entitlement.
    pub user_id: UserId,

    /// Organization that owns the entitlement (the user's personal org).
    pub organization_id: OrganizationId,

    /// Membership through which the entitlement is attached.
    pub organization_membership_id: MembershipId,

    /// What kind of access this grants.
    pub entitlement_type: EntitlementType,

    /// The purchase, coupon, or manual grant that justifies this row.
    pub source: EntitlementSource,

    /// Resource the entitlement unlocks, if any.
    pub resource_id: Option<ResourceId>,

    /// Open key/value context (e.g. `eligibilityProductId`, `communityRoleId`).
    pub metadata: Map<String, JsonValue>,

    /// When the entitlement was granted.
    pub created_at: Timestamp,

    /// Tombstone marker. `Some` means revoked; the row is kept forever.
    pub deleted_at: Option<Timestamp>,
}

impl Entitlement {
    /// Creates a live entitlement for the given key.
    pub fn grant(
        key: EntitlementKey,
        organization_id: OrganizationId,
        organization_membership_id: MembershipId,
        metadata: Map<String, JsonValue>,
    ) -> Self {
        Self {
            id: key.entitlement_id(),
            user_id: key.user_id,
            organization_id,
            organization_membership_id,
            entitlement_type: key.entitlement_type,
            source: key.source,
            resource_id: key.resource_id,
            metadata,
            created_at: Timestamp::now(),
            deleted_at: None,
        }
    }

    /// The idempotency key this entitlement was granted under.
    pub fn key(&self) -> EntitlementKey {
        EntitlementKey {
            user_id: self.user_id,
            source: self.source,
            entitlement_type: self.entitlement_type,
            resource_id: self.resource_id,
        }
    }

    /// Whether this entitlement is live (not tombstoned).
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Writes the tombstone. Tombstoning an already-tombstoned row is a
    /// no-op; the original revocation time is preserved.
    pub fn tombstone(&mut self) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(Timestamp::now());
        }
    }

    /// Reads a string metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// A copy of this entitlement re-granted to another user under another
    /// organization. Used by the transfer saga: the new row gets the id the
    /// target user's key derives, preserving metadata and source.
    pub fn regrant_to(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        organization_membership_id: MembershipId,
    ) -> Entitlement {
        let key = EntitlementKey {
            user_id,
            source: self.source,
            entitlement_type: self.entitlement_type,
            resource_id: self.resource_id,
        };
        Entitlement::grant(
            key,
            organization_id,
            organization_membership_id,
            self.metadata.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PurchaseId;
    use serde_json::json;

    fn test_key() -> EntitlementKey {
        EntitlementKey::new(
            UserId::new(),
            EntitlementSource::Purchase(PurchaseId::new()),
            EntitlementType::ContentAccess,
            Some(ResourceId::new()),
        )
    }

    fn test_grant(key: EntitlementKey) -> Entitlement {
        Entitlement::grant(key, OrganizationId::new(), MembershipId::new(), Map::new())
    }

    #[test]
    fn equal_keys_derive_equal_ids() {
        let key = test_key();
        assert_eq!(key.entitlement_id(), key.entitlement_id());
    }

    #[test]
    fn different_resources_derive_different_ids() {
        let user = UserId::new();
        let source = EntitlementSource::Purchase(PurchaseId::new());
        let a = EntitlementKey::new(
            user,
            source,
            EntitlementType::ContentAccess,
            Some(ResourceId::new()),
        );
        let b = EntitlementKey::new(
            user,
            source,
            EntitlementType::ContentAccess,
            Some(ResourceId::new()),
        );
        assert_ne!(a.entitlement_id(), b.entitlement_id());
    }

    #[test]
    fn missing_resource_changes_the_id() {
        let mut key = test_key();
        let with_resource = key.entitlement_id();
        key.resource_id = None;
        assert_ne!(key.entitlement_id(), with_resource);
    }

    #[test]
    fn grant_is_live_and_keyed() {
        let key = test_key();
        let entitlement = test_grant(key);
        assert!(entitlement.is_live());
        assert_eq!(entitlement.key(), key);
        assert_eq!(entitlement.id, key.entitlement_id());
    }

    #[test]
    fn tombstone_is_idempotent() {
        let mut entitlement = test_grant(test_key());
        entitlement.tombstone();
        let first = entitlement.deleted_at;
        assert!(first.is_some());

        entitlement.tombstone();
        assert_eq!(entitlement.deleted_at, first);
        assert!(!entitlement.is_live());
    }

    #[test]
    fn metadata_str_reads_string_values() {
        let key = test_key();
        let mut metadata = Map::new();
        metadata.insert(META_DAY_ONE_UNLOCK_DATE.to_string(), json!("TBD"));
        metadata.insert("position".to_string(), json!(3));

        let entitlement = Entitlement::grant(
            key,
            OrganizationId::new(),
            MembershipId::new(),
            metadata,
        );
        assert_eq!(entitlement.metadata_str(META_DAY_ONE_UNLOCK_DATE), Some("TBD"));
        assert_eq!(entitlement.metadata_str("position"), None);
    }

    #[test]
    fn regrant_preserves_source_and_metadata() {
        let key = test_key();
        let mut metadata = Map::new();
        metadata.insert(META_ELIGIBILITY_PRODUCT_ID.to_string(), json!("prod-1"));
        let original =
            Entitlement::grant(key, OrganizationId::new(), MembershipId::new(), metadata);

        let target = UserId::new();
        let regranted = original.regrant_to(target, OrganizationId::new(), MembershipId::new());

        assert_eq!(regranted.user_id, target);
        assert_eq!(regranted.source, original.source);
        assert_eq!(regranted.metadata, original.metadata);
        assert_ne!(regranted.id, original.id);
        assert!(regranted.is_live());
    }
}
