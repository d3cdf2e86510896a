//! Organization domain - ownership containers for entitlements.

mod organization;

pub use organization::{MemberRole, Organization, OrganizationMembership};
