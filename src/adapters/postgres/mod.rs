//! PostgreSQL adapters - sqlx-backed implementations of the persistence
//! ports.

mod coupon_repository;
mod entitlement_store;
mod event_outbox;
mod organization_repository;
mod processed_event_store;
mod purchase_repository;
mod resource_catalog;
mod user_directory;

pub use coupon_repository::{PostgresCouponRepository, PostgresMerchantCouponRepository};
pub use entitlement_store::PostgresEntitlementStore;
pub use event_outbox::PostgresEventOutbox;
pub use organization_repository::PostgresOrganizationRepository;
pub use processed_event_store::PostgresProcessedEventStore;
pub use purchase_repository::PostgresPurchaseRepository;
pub use resource_catalog::PostgresResourceCatalog;
pub use user_directory::PostgresUserDirectory;
