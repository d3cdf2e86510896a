//! In-memory organization repository for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, OrganizationId, UserId};
use crate::domain::organization::{Organization, OrganizationMembership};
use crate::ports::{InsertOutcome, OrganizationRepository};

/// In-memory [`OrganizationRepository`].
pub struct InMemoryOrganizationRepository {
    organizations: Mutex<Vec<Organization>>,
    memberships: Mutex<Vec<OrganizationMembership>>,
}

impl InMemoryOrganizationRepository {
    pub fn new() -> Self {
        Self {
            organizations: Mutex::new(Vec::new()),
            memberships: Mutex::new(Vec::new()),
        }
    }

    /// All organizations (for test assertions).
    pub fn organizations(&self) -> Vec<Organization> {
        self.organizations
            .lock()
            .expect("InMemoryOrganizationRepository: lock poisoned")
            .clone()
    }

    /// All memberships (for test assertions).
    pub fn memberships(&self) -> Vec<OrganizationMembership> {
        self.memberships
            .lock()
            .expect("InMemoryOrganizationRepository: lock poisoned")
            .clone()
    }
}

impl Default for InMemoryOrganizationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn find_personal_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Organization>, DomainError> {
        Ok(self
            .organizations()
            .into_iter()
            .find(|o| o.personal_for_user_id.as_ref() == Some(user_id)))
    }

    async fn insert_organization(
        &self,
        organization: &Organization,
    ) -> Result<InsertOutcome<Organization>, DomainError> {
        let mut organizations = self
            .organizations
            .lock()
            .expect("InMemoryOrganizationRepository: lock poisoned");
        if organization.personal_for_user_id.is_some() {
            if let Some(existing) = organizations
                .iter()
                .find(|o| o.personal_for_user_id == organization.personal_for_user_id)
            {
                return Ok(InsertOutcome::Duplicate(existing.clone()));
            }
        }
        organizations.push(organization.clone());
        Ok(InsertOutcome::Created(organization.clone()))
    }

    async fn find_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>, DomainError> {
        Ok(self
            .memberships()
            .into_iter()
            .find(|m| &m.organization_id == organization_id && &m.user_id == user_id))
    }

    async fn insert_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<InsertOutcome<OrganizationMembership>, DomainError> {
        let mut memberships = self
            .memberships
            .lock()
            .expect("InMemoryOrganizationRepository: lock poisoned");
        if let Some(existing) = memberships.iter().find(|m| {
            m.organization_id == membership.organization_id && m.user_id == membership.user_id
        }) {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        memberships.push(membership.clone());
        Ok(InsertOutcome::Created(membership.clone()))
    }
}
