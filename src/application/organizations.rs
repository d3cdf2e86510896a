//! Personal organization provisioning.
//!
//! Every user has exactly one personal organization, created lazily the
//! first time something needs to attach state to them, and holds a
//! `learner` membership in it before any entitlement is attached. Grant
//! paths and both ends of a transfer go through this helper.

use tracing::info;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::organization::{Organization, OrganizationMembership};
use crate::ports::OrganizationRepository;

/// Ensures the user has a personal organization and a learner membership
/// in it, creating whichever is missing.
///
/// Safe under concurrency: both inserts are keyed by unique constraints,
/// and a losing writer proceeds with the winner's row.
pub async fn ensure_personal_learner(
    repository: &dyn OrganizationRepository,
    user_id: &UserId,
) -> Result<(Organization, OrganizationMembership), DomainError> {
    let organization = match repository.find_personal_for_user(user_id).await? {
        Some(existing) => existing,
        None => {
            let outcome = repository
                .insert_organization(&Organization::personal(*user_id))
                .await?;
            if outcome.was_created() {
                info!(user_id = %user_id, "Created personal organization");
            }
            outcome.into_inner()
        }
    };

    let membership = match repository
        .find_membership(&organization.id, user_id)
        .await?
    {
        Some(existing) => existing,
        None => {
            let outcome = repository
                .insert_membership(&OrganizationMembership::learner(organization.id, *user_id))
                .await?;
            outcome.into_inner()
        }
    };

    Ok((organization, membership))
}
