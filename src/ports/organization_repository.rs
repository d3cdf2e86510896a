//! OrganizationRepository port - personal organizations and memberships.
//!
//! The engine only ever provisions the one-per-user personal organization
//! and learner memberships inside it. Both inserts are keyed by unique
//! constraints so concurrent provisioning resolves to a single row.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrganizationId, UserId};
use crate::domain::organization::{Organization, OrganizationMembership};

use super::InsertOutcome;

/// Repository port for organizations and their memberships.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Finds a user's personal organization, if one exists.
    async fn find_personal_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Organization>, DomainError>;

    /// Inserts an organization. On a collision with an existing personal
    /// organization for the same owner, returns `Duplicate` with the
    /// existing row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert_organization(
        &self,
        organization: &Organization,
    ) -> Result<InsertOutcome<Organization>, DomainError>;

    /// Finds a user's membership in an organization.
    async fn find_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>, DomainError>;

    /// Inserts a membership. On a `(organization, user)` collision,
    /// returns `Duplicate` with the existing row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<InsertOutcome<OrganizationMembership>, DomainError>;
}
