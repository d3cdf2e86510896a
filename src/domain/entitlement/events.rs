//! Entitlement domain events.
//!
//! Emitted on grant/revoke for audit and for the out-of-scope collaborators
//! listed in the integration contract: `community-role.grant-requested` is
//! consumed by the Discord role manager, `user-welcome-email.requested` by
//! the email sender.
//!
//! Events are named in past tense for things that happened and
//! `*-requested` for work handed to a collaborator.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    EntitlementId, EventEnvelope, ProductId, PurchaseId, ResourceId, Timestamp, UserId,
};

use super::{EntitlementSource, EntitlementType};

/// What kind of resource a community role grant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTargetType {
    Cohort,
    Module,
}

impl std::fmt::Display for RoleTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleTargetType::Cohort => write!(f, "cohort"),
            RoleTargetType::Module => write!(f, "module"),
        }
    }
}

/// Events that occur during entitlement lifecycle and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntitlementEvent {
    /// An entitlement row was created (or re-created for a transfer target).
    Granted {
        entitlement_id: EntitlementId,
        user_id: UserId,
        entitlement_type: EntitlementType,
        source: EntitlementSource,
        resource_id: Option<ResourceId>,
        occurred_at: Timestamp,
    },

    /// An entitlement was tombstoned.
    Revoked {
        entitlement_id: EntitlementId,
        user_id: UserId,
        entitlement_type: EntitlementType,
        source: EntitlementSource,
        occurred_at: Timestamp,
    },

    /// A community-platform role should be granted to the user.
    ///
    /// Consumed by the Discord role-management collaborator. The same event
    /// path serves fresh purchase grants and the grant half of a transfer,
    /// so both stay consistent.
    CommunityRoleGrantRequested {
        target_type: RoleTargetType,
        target_id: ResourceId,
        user_id: UserId,
        role_id: String,
        occurred_at: Timestamp,
    },

    /// A welcome email should be sent for a first-time purchase grant.
    WelcomeEmailRequested {
        user_id: UserId,
        purchase_id: PurchaseId,
        product_id: ProductId,
        occurred_at: Timestamp,
    },
}

impl EntitlementEvent {
    /// Returns the versioned event type string for routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            EntitlementEvent::Granted { .. } => "entitlement.granted.v1",
            EntitlementEvent::Revoked { .. } => "entitlement.revoked.v1",
            EntitlementEvent::CommunityRoleGrantRequested { .. } => {
                "community-role.grant-requested.v1"
            }
            EntitlementEvent::WelcomeEmailRequested { .. } => "user-welcome-email.requested.v1",
        }
    }

    /// Returns the user this event concerns.
    pub fn user_id(&self) -> &UserId {
        match self {
            EntitlementEvent::Granted { user_id, .. }
            | EntitlementEvent::Revoked { user_id, .. }
            | EntitlementEvent::CommunityRoleGrantRequested { user_id, .. }
            | EntitlementEvent::WelcomeEmailRequested { user_id, .. } => user_id,
        }
    }

    /// Returns when this event occurred.
    pub fn occurred_at(&self) -> Timestamp {
        match self {
            EntitlementEvent::Granted { occurred_at, .. }
            | EntitlementEvent::Revoked { occurred_at, .. }
            | EntitlementEvent::CommunityRoleGrantRequested { occurred_at, .. }
            | EntitlementEvent::WelcomeEmailRequested { occurred_at, .. } => *occurred_at,
        }
    }

    /// Wraps this event in a transport envelope.
    pub fn to_envelope(&self) -> EventEnvelope {
        let aggregate_id = match self {
            EntitlementEvent::Granted { entitlement_id, .. }
            | EntitlementEvent::Revoked { entitlement_id, .. } => entitlement_id.to_string(),
            EntitlementEvent::CommunityRoleGrantRequested { target_id, .. } => {
                target_id.to_string()
            }
            EntitlementEvent::WelcomeEmailRequested { purchase_id, .. } => {
                purchase_id.to_string()
            }
        };
        EventEnvelope::new(
            self.event_type(),
            aggregate_id,
            "Entitlement",
            serde_json::to_value(self)
                .expect("Event serialization should never fail for well-formed events"),
        )
        .with_user_id(self.user_id().to_string())
    }
}
