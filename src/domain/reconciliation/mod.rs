//! Reconciliation domain - desired-state resolvers and the diff engine.

mod desired_state;
mod diff;

pub use desired_state::{
    resolve, DesiredEntitlement, DesiredEntitlementSet, DesiredRoleGrant,
};
pub use diff::{apply_to_set, diff, ReconcilePlan};
