//! In-memory resource catalog for tests.
//!
//! # Security Note
//!
//! Testing only; lock operations use `.expect()`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::catalog::{Product, ResourceContext};
use crate::domain::foundation::{DomainError, ProductId, ResourceId};
use crate::ports::ResourceCatalog;

/// In-memory [`ResourceCatalog`].
pub struct InMemoryResourceCatalog {
    entries: Mutex<Vec<(Product, ResourceContext)>>,
}

impl InMemoryResourceCatalog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Seeds a product with its resource tree, replacing any prior entry
    /// for the same product (for test setup).
    pub fn put(&self, product: Product, context: ResourceContext) {
        let mut entries = self
            .entries
            .lock()
            .expect("InMemoryResourceCatalog: lock poisoned");
        entries.retain(|(p, _)| p.id != product.id);
        entries.push((product, context));
    }
}

impl Default for InMemoryResourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryResourceCatalog {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError> {
        Ok(self
            .entries
            .lock()
            .expect("InMemoryResourceCatalog: lock poisoned")
            .iter()
            .find(|(p, _)| &p.id == product_id)
            .map(|(p, _)| p.clone()))
    }

    async fn get_resource_context(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ResourceContext>, DomainError> {
        Ok(self
            .entries
            .lock()
            .expect("InMemoryResourceCatalog: lock poisoned")
            .iter()
            .find(|(p, _)| &p.id == product_id)
            .map(|(_, c)| c.clone()))
    }

    async fn find_product_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Option<Product>, DomainError> {
        Ok(self
            .entries
            .lock()
            .expect("InMemoryResourceCatalog: lock poisoned")
            .iter()
            .find(|(p, _)| &p.primary_resource_id == resource_id)
            .map(|(p, _)| p.clone()))
    }
}
