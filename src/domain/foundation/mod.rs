//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, error types, and event
//! infrastructure that form the vocabulary of the entitlement domain.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{EventEnvelope, EventId, EventMetadata};
pub use ids::{
    CouponId, EntitlementId, MembershipId, MerchantCouponId, OrganizationId, ProductId,
    PurchaseId, ResourceId, UserId,
};
pub use timestamp::Timestamp;
