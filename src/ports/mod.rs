//! Ports - interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `EntitlementStore` - entitlement rows, tombstones, atomic transfers
//! - `CouponRepository` / `MerchantCouponRepository` - discount registry
//! - `PurchaseRepository` - purchase reads plus status/ownership writes
//! - `OrganizationRepository` - personal organizations and memberships
//! - `ProcessedEventStore` - idempotent event intake claims
//!
//! ## External System Ports
//!
//! - `PaymentProvider` - discount objects and checkout lookups
//! - `CommunityRoleApi` - role assignment in the community platform
//! - `ResourceCatalog` - read-only product and resource tree view
//! - `UserDirectory` - read-only identity lookup
//!
//! ## Event Ports
//!
//! - `EventPublisher` - outbound domain events

mod community_role_api;
mod coupon_registry;
mod entitlement_store;
mod event_publisher;
mod organization_repository;
mod payment_provider;
mod processed_event_store;
mod purchase_repository;
mod resource_catalog;
mod user_directory;

pub use community_role_api::CommunityRoleApi;
pub use coupon_registry::{CouponRepository, MerchantCouponRepository};
pub use entitlement_store::{EntitlementStore, InsertOutcome};
pub use event_publisher::EventPublisher;
pub use organization_repository::OrganizationRepository;
pub use payment_provider::{
    CheckoutSession, CreateDiscountRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    ProviderDiscount,
};
pub use processed_event_store::ProcessedEventStore;
pub use purchase_repository::PurchaseRepository;
pub use resource_catalog::ResourceCatalog;
pub use user_directory::{UserDirectory, UserRecord};
