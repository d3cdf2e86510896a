//! Organizations and memberships.
//!
//! Every user has exactly one personal organization, created lazily on
//! first need, which owns their individual entitlements. A user always
//! holds at least one `learner` membership before any entitlement can be
//! attached to them - the grant paths ensure this, and the transfer saga
//! self-heals a source user left without one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{MembershipId, OrganizationId, Timestamp, UserId};

/// Role a member holds within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Learner,
    Owner,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Learner => "learner",
            MemberRole::Owner => "owner",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An organization owning purchases and entitlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,

    pub name: String,

    /// Set for the per-user personal organization.
    pub personal_for_user_id: Option<UserId>,

    pub created_at: Timestamp,
}

impl Organization {
    /// Creates the personal organization for a user.
    pub fn personal(user_id: UserId) -> Self {
        Self {
            id: OrganizationId::new(),
            name: format!("Personal ({})", user_id),
            personal_for_user_id: Some(user_id),
            created_at: Timestamp::now(),
        }
    }

    pub fn is_personal(&self) -> bool {
        self.personal_for_user_id.is_some()
    }
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub id: MembershipId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub created_at: Timestamp,
}

impl OrganizationMembership {
    /// Creates a learner membership.
    pub fn learner(organization_id: OrganizationId, user_id: UserId) -> Self {
        Self {
            id: MembershipId::new(),
            organization_id,
            user_id,
            role: MemberRole::Learner,
            created_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_organization_belongs_to_the_user() {
        let user = UserId::new();
        let org = Organization::personal(user);
        assert!(org.is_personal());
        assert_eq!(org.personal_for_user_id, Some(user));
    }

    #[test]
    fn learner_membership_has_learner_role() {
        let org = Organization::personal(UserId::new());
        let membership = OrganizationMembership::learner(org.id, UserId::new());
        assert_eq!(membership.role, MemberRole::Learner);
        assert_eq!(membership.organization_id, org.id);
    }
}
