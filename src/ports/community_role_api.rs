//! CommunityRoleApi port - role assignment in the community platform.
//!
//! Role *grants* normally flow through the event bus so the community
//! integration can retry them independently; the direct `grant_role` call
//! exists for the same integration's consumer side. Role *revokes* are
//! called directly by refund and transfer flows, which need the removal to
//! be part of their own retry envelope.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// Port into the community platform's role management.
///
/// Both operations are idempotent on the far side: granting a role the
/// user already holds or revoking one they lack is a success.
#[async_trait]
pub trait CommunityRoleApi: Send + Sync {
    /// Assigns a role to a user.
    async fn grant_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError>;

    /// Removes a role from a user.
    async fn revoke_role(&self, user_id: &UserId, role_id: &str) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_role_api_is_object_safe() {
        fn _accepts_dyn(_api: &dyn CommunityRoleApi) {}
    }
}
