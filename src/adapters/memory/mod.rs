//! In-memory adapters backing unit and integration tests.
//!
//! Each mirrors its Postgres or HTTP counterpart's semantics closely
//! enough that handler tests exercise real control flow. None of these are
//! wired into the production binary.

mod community_role_api;
mod coupon_repository;
mod entitlement_store;
mod organization_repository;
mod processed_event_store;
mod purchase_repository;
mod resource_catalog;
mod user_directory;

pub use community_role_api::RecordingCommunityRoleApi;
pub use coupon_repository::{InMemoryCouponRepository, InMemoryMerchantCouponRepository};
pub use entitlement_store::InMemoryEntitlementStore;
pub use organization_repository::InMemoryOrganizationRepository;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use purchase_repository::InMemoryPurchaseRepository;
pub use resource_catalog::InMemoryResourceCatalog;
pub use user_directory::InMemoryUserDirectory;
