//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `entitlement` - The entitlement aggregate, its idempotency key, and events
//! - `coupon` - Internal coupons, merchant coupon mirrors, eligibility predicates
//! - `purchase` - Purchase records and status
//! - `organization` - Personal organizations and learner memberships
//! - `catalog` - Product shapes and the resource-context view
//! - `reconciliation` - Desired-state resolvers and the diff engine

pub mod catalog;
pub mod coupon;
pub mod entitlement;
pub mod foundation;
pub mod organization;
pub mod purchase;
pub mod reconciliation;
