//! Purchase domain - the commerce records that justify entitlements.

mod purchase;

pub use purchase::{Purchase, PurchaseStatus};
