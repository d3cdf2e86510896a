//! Catalog domain - products and the resources they unlock.
//!
//! The content catalog itself is an external read-only oracle; these types
//! are the engine's view of what it returns.

mod product;
mod resource_context;

pub use product::{Product, ProductType};
pub use resource_context::{
    ResourceAttribution, ResourceContext, ResourceKind, ResourceRef, UnlockDate,
};
