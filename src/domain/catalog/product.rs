//! Products and product types.
//!
//! The engine manages a closed set of product shapes. Each shape selects a
//! desired-state resolver by pattern match - tagged variants instead of a
//! runtime type-to-config lookup, so an unhandled shape is a compile error
//! rather than a missing map entry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ProductId, ResourceId};

/// The product shapes the engine knows how to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductType {
    /// A scheduled cohort with ordered child workshops and optional
    /// standalone bonus workshops.
    Cohort,
    /// A self-paced module with sections.
    SelfPacedModule,
    /// A one-off live event.
    LiveEvent,
}

impl ProductType {
    /// Parses a catalog type slug. Returns `None` for shapes the engine
    /// does not manage (e.g. "subscription") - callers treat those as
    /// structured skips, not errors.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "cohort" => Some(ProductType::Cohort),
            "self-paced-module" => Some(ProductType::SelfPacedModule),
            "live-event" => Some(ProductType::LiveEvent),
            _ => None,
        }
    }

    /// Stable slug used in persistence and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Cohort => "cohort",
            ProductType::SelfPacedModule => "self-paced-module",
            ProductType::LiveEvent => "live-event",
        }
    }

    /// Whether purchases of this shape may be transferred between users.
    ///
    /// Every managed shape is transferable; unmanaged catalog types (which
    /// never parse into this enum) are not.
    pub fn is_transferable(&self) -> bool {
        match self {
            ProductType::Cohort | ProductType::SelfPacedModule => true,
            ProductType::LiveEvent => true,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A product as the catalog oracle reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,

    pub name: String,

    /// Raw catalog type slug. May name shapes the engine does not manage.
    pub product_type: String,

    /// The primary resource the product unlocks.
    pub primary_resource_id: ResourceId,

    /// Community-platform role granted with the primary resource, if any.
    pub community_role_id: Option<String>,
}

impl Product {
    /// The managed product shape, when this product has one.
    pub fn managed_type(&self) -> Option<ProductType> {
        ProductType::from_slug(&self.product_type)
    }
}
