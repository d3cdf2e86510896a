//! Reconciler - applies desired state through the entitlement store.
//!
//! Two entry points share the same primitives: `grant_desired` creates
//! whatever a resolver wants that does not already exist (fresh purchase,
//! coupon redemption, transfer grant half), and `reconcile_source` runs the
//! full diff of desired vs actual for one user and source, creating and
//! tombstoning to converge (cohort sync).
//!
//! Every mutation is routed through the store's idempotency tuple, so
//! re-running either entry point converges instead of double-granting.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::domain::entitlement::{
    Entitlement, EntitlementEvent, EntitlementKey, EntitlementSource,
};
use crate::domain::foundation::{DomainError, MembershipId, OrganizationId, Timestamp, UserId};
use crate::domain::reconciliation::{diff, DesiredEntitlementSet};
use crate::ports::{EntitlementStore, EventPublisher};

/// Outcome of a grant pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantReport {
    /// Entitlements created by this pass.
    pub created: usize,
    /// Entitlements that already existed live.
    pub already_live: usize,
}

/// Outcome of one user's reconciliation against a source.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSyncResult {
    pub user_id: UserId,
    pub added: usize,
    pub removed: usize,
}

/// Applies resolver output through the entitlement store and emits
/// lifecycle events.
pub struct Reconciler {
    store: Arc<dyn EntitlementStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EntitlementStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Creates every desired entitlement that is not already live and
    /// requests every desired community-role grant.
    ///
    /// Role-grant events are emitted unconditionally: the far side
    /// tolerates duplicates, and a partially-failed earlier run may have
    /// created the entitlement row without the role reaching the user.
    pub async fn grant_desired(
        &self,
        user_id: UserId,
        desired: &DesiredEntitlementSet,
        organization_id: OrganizationId,
        membership_id: MembershipId,
    ) -> Result<GrantReport, DomainError> {
        let mut report = GrantReport::default();
        let mut events = Vec::new();

        for wanted in &desired.entitlements {
            let entitlement = Entitlement::grant(
                wanted.key,
                organization_id,
                membership_id,
                wanted.metadata.clone(),
            );
            let outcome = self.store.insert_if_absent(&entitlement).await?;
            if outcome.was_created() {
                report.created += 1;
                events.push(granted_event(&outcome.into_inner()).to_envelope());
            } else {
                report.already_live += 1;
            }
        }

        for role in &desired.role_grants {
            events.push(
                EntitlementEvent::CommunityRoleGrantRequested {
                    target_type: role.target_type,
                    target_id: role.target_id,
                    user_id,
                    role_id: role.role_id.clone(),
                    occurred_at: Timestamp::now(),
                }
                .to_envelope(),
            );
        }

        self.publisher.publish_all(events).await?;
        info!(
            user_id = %user_id,
            created = report.created,
            already_live = report.already_live,
            "Applied grant pass"
        );
        Ok(report)
    }

    /// Diffs desired against the user's live set for `source` and applies
    /// the plan. Removal is restricted to the source's type, so this pass
    /// never revokes entitlements it does not own.
    pub async fn reconcile_source(
        &self,
        user_id: UserId,
        source: EntitlementSource,
        desired: &DesiredEntitlementSet,
        organization_id: OrganizationId,
        membership_id: MembershipId,
    ) -> Result<UserSyncResult, DomainError> {
        let actual_rows = self.store.live_for_user_and_source(&user_id, &source).await?;
        let actual: std::collections::HashSet<EntitlementKey> =
            actual_rows.iter().map(|e| e.key()).collect();
        let plan = diff(&desired.keys(), &actual, source.source_type());

        let metadata: HashMap<EntitlementKey, Map<String, JsonValue>> = desired
            .entitlements
            .iter()
            .map(|e| (e.key, e.metadata.clone()))
            .collect();

        let mut events = Vec::new();
        let mut added = 0;
        for key in &plan.to_add {
            let entitlement = Entitlement::grant(
                *key,
                organization_id,
                membership_id,
                metadata.get(key).cloned().unwrap_or_default(),
            );
            let outcome = self.store.insert_if_absent(&entitlement).await?;
            if outcome.was_created() {
                added += 1;
                events.push(granted_event(&outcome.into_inner()).to_envelope());
            }
        }

        let mut removed = 0;
        for key in &plan.to_remove {
            if self.store.tombstone(&key.entitlement_id()).await? {
                removed += 1;
                events.push(
                    EntitlementEvent::Revoked {
                        entitlement_id: key.entitlement_id(),
                        user_id: key.user_id,
                        entitlement_type: key.entitlement_type,
                        source: key.source,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                );
            }
        }

        self.publisher.publish_all(events).await?;
        info!(
            user_id = %user_id,
            source = %source,
            added,
            removed,
            "Reconciled user against source"
        );
        Ok(UserSyncResult {
            user_id,
            added: plan.to_add.len(),
            removed: plan.to_remove.len(),
        })
    }

    /// Tombstones every live entitlement the user holds from `source`,
    /// emitting a revoked event per row actually tombstoned. Returns the
    /// rows that were live before the pass.
    pub async fn revoke_all_from_source(
        &self,
        user_id: UserId,
        source: EntitlementSource,
    ) -> Result<Vec<Entitlement>, DomainError> {
        let live = self.store.live_for_user_and_source(&user_id, &source).await?;
        let mut events = Vec::new();
        for entitlement in &live {
            if self.store.tombstone(&entitlement.id).await? {
                events.push(
                    EntitlementEvent::Revoked {
                        entitlement_id: entitlement.id,
                        user_id: entitlement.user_id,
                        entitlement_type: entitlement.entitlement_type,
                        source: entitlement.source,
                        occurred_at: Timestamp::now(),
                    }
                    .to_envelope(),
                );
            }
        }
        self.publisher.publish_all(events).await?;
        info!(
            user_id = %user_id,
            source = %source,
            revoked = live.len(),
            "Revoked live entitlements from source"
        );
        Ok(live)
    }
}

fn granted_event(entitlement: &Entitlement) -> EntitlementEvent {
    EntitlementEvent::Granted {
        entitlement_id: entitlement.id,
        user_id: entitlement.user_id,
        entitlement_type: entitlement.entitlement_type,
        source: entitlement.source,
        resource_id: entitlement.resource_id,
        occurred_at: Timestamp::now(),
    }
}
