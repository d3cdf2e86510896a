//! ResourceCatalog port - read-only view of products and their resources.
//!
//! The catalog (products, cohorts, workshops, schedules) is owned by the
//! content system. Reconciliation reads it to compute desired state and
//! never writes to it.

use async_trait::async_trait;

use crate::domain::catalog::{Product, ResourceContext};
use crate::domain::foundation::{DomainError, ProductId, ResourceId};

/// Read-only port into the content system's catalog.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Looks a product up by id.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError>;

    /// The full resource tree a product unlocks: primary resource plus
    /// attributed children and standalone bonuses, with schedule fields.
    async fn get_resource_context(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ResourceContext>, DomainError>;

    /// The product whose primary resource is the given resource.
    ///
    /// Cohort-change notifications carry only the cohort's resource id;
    /// this resolves the owning product.
    async fn find_product_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Option<Product>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn ResourceCatalog) {}
    }
}
