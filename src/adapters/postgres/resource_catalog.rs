//! PostgreSQL-backed read view of the content catalog.
//!
//! Products and their resource trees live in tables owned by the content
//! system; this adapter only ever reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::catalog::{
    Product, ProductType, ResourceAttribution, ResourceContext, ResourceKind, ResourceRef,
};
use crate::domain::foundation::{DomainError, ErrorCode, ProductId, ResourceId, Timestamp};
use crate::ports::ResourceCatalog;

/// PostgreSQL implementation of the ResourceCatalog port.
pub struct PostgresResourceCatalog {
    pool: PgPool,
}

impl PostgresResourceCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    product_type: String,
    primary_resource_id: Uuid,
    community_role_id: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            product_type: row.product_type,
            primary_resource_id: ResourceId::from_uuid(row.primary_resource_id),
            community_role_id: row.community_role_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    resource_id: Uuid,
    kind: String,
    attribution: String,
    position: Option<i32>,
    starts_at: Option<DateTime<Utc>>,
}

impl TryFrom<ResourceRow> for ResourceRef {
    type Error = DomainError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(ResourceRef {
            resource_id: ResourceId::from_uuid(row.resource_id),
            kind: parse_kind(&row.kind)?,
            attribution: parse_attribution(&row.attribution)?,
            position: row.position.map(|p| p as u32),
            starts_at: row.starts_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_kind(value: &str) -> Result<ResourceKind, DomainError> {
    match value {
        "cohort" => Ok(ResourceKind::Cohort),
        "workshop" => Ok(ResourceKind::Workshop),
        "section" => Ok(ResourceKind::Section),
        "event" => Ok(ResourceKind::Event),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Unknown resource kind in catalog: {}", other),
        )),
    }
}

fn parse_attribution(value: &str) -> Result<ResourceAttribution, DomainError> {
    match value {
        "primary" => Ok(ResourceAttribution::Primary),
        "cohort_child" => Ok(ResourceAttribution::Child),
        "standalone_bonus" => Ok(ResourceAttribution::StandaloneBonus),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Unknown resource attribution in catalog: {}", other),
        )),
    }
}

fn db_error(context: &str, error: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, error))
}

const PRODUCT_COLUMNS: &str = "id, name, product_type, primary_resource_id, community_role_id";

#[async_trait]
impl ResourceCatalog for PostgresResourceCatalog {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find product", e))?;

        Ok(row.map(Product::from))
    }

    async fn get_resource_context(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ResourceContext>, DomainError> {
        let Some(product) = self.get_product(product_id).await? else {
            return Ok(None);
        };
        // Catalog types the engine does not manage have no resource tree
        // from the engine's perspective.
        let Some(product_type) = ProductType::from_slug(&product.product_type) else {
            return Ok(None);
        };

        let rows: Vec<ResourceRow> = sqlx::query_as(
            "SELECT resource_id, kind, attribution, position, starts_at \
             FROM product_resources WHERE product_id = $1 \
             ORDER BY attribution, position NULLS LAST",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load product resources", e))?;

        let resources = rows
            .into_iter()
            .map(ResourceRef::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ResourceContext {
            product_id: product.id,
            product_type,
            resources,
        }))
    }

    async fn find_product_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE primary_resource_id = $1"
        ))
        .bind(resource_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find product for resource", e))?;

        Ok(row.map(Product::from))
    }
}
