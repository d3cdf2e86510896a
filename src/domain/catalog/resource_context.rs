//! Resource context - the derived view of what a product unlocks.
//!
//! Recomputed on demand from the content catalog oracle; never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ProductId, ResourceId, Timestamp};

use super::ProductType;

/// The kind of content resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cohort,
    Workshop,
    Section,
    Event,
}

/// How a resource entered the desired set.
///
/// Kept distinct so standalone bonus grants can be revoked independently
/// of ordered cohort children during a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAttribution {
    /// The product's primary resource.
    Primary,
    /// An ordered child of the primary resource.
    Child,
    /// A standalone bonus resource referenced alongside the children.
    StandaloneBonus,
}

impl ResourceAttribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAttribution::Primary => "primary",
            ResourceAttribution::Child => "cohort_child",
            ResourceAttribution::StandaloneBonus => "standalone_bonus",
        }
    }
}

/// When a resource's first content unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockDate {
    Date(Timestamp),
    /// Unlock date is not yet scheduled.
    Tbd,
}

impl fmt::Display for UnlockDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockDate::Date(ts) => write!(f, "{}", ts.as_date_string()),
            UnlockDate::Tbd => write!(f, "TBD"),
        }
    }
}

/// One resource a purchase unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub attribution: ResourceAttribution,

    /// Position among ordered siblings, when the resource is a child.
    pub position: Option<u32>,

    /// Scheduled start of the resource's first content, when known.
    pub starts_at: Option<Timestamp>,
}

/// The full set of resources a product unlocks: the primary resource plus
/// nested children and standalone bonuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContext {
    pub product_id: ProductId,
    pub product_type: ProductType,
    pub resources: Vec<ResourceRef>,
}

impl ResourceContext {
    /// The primary resource.
    ///
    /// A well-formed context always has exactly one; a context without one
    /// is a catalog defect surfaced by the callers.
    pub fn primary(&self) -> Option<&ResourceRef> {
        self.resources
            .iter()
            .find(|r| r.attribution == ResourceAttribution::Primary)
    }

    /// Every non-primary resource: ordered children and standalone bonuses.
    pub fn secondary(&self) -> impl Iterator<Item = &ResourceRef> {
        self.resources
            .iter()
            .filter(|r| r.attribution != ResourceAttribution::Primary)
    }

    /// The day-one unlock date: the start of the first child resource by
    /// position, `Tbd` when no child carries a schedule.
    pub fn day_one_unlock(&self) -> UnlockDate {
        self.resources
            .iter()
            .filter(|r| r.attribution == ResourceAttribution::Child)
            .min_by_key(|r| r.position.unwrap_or(u32::MAX))
            .and_then(|first| first.starts_at)
            .map(UnlockDate::Date)
            .unwrap_or(UnlockDate::Tbd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(position: u32, starts_at: Option<Timestamp>) -> ResourceRef {
        ResourceRef {
            resource_id: ResourceId::new(),
            kind: ResourceKind::Workshop,
            attribution: ResourceAttribution::Child,
            position: Some(position),
            starts_at,
        }
    }

    fn context(resources: Vec<ResourceRef>) -> ResourceContext {
        ResourceContext {
            product_id: ProductId::new(),
            product_type: ProductType::Cohort,
            resources,
        }
    }

    #[test]
    fn day_one_unlock_uses_first_child_by_position() {
        let early = Timestamp::now();
        let late = early.add_days(30);
        let ctx = context(vec![child(2, Some(late)), child(1, Some(early))]);

        assert_eq!(ctx.day_one_unlock(), UnlockDate::Date(early));
    }

    #[test]
    fn day_one_unlock_falls_back_to_tbd() {
        let ctx = context(vec![child(1, None), child(2, None)]);
        assert_eq!(ctx.day_one_unlock(), UnlockDate::Tbd);
        assert_eq!(ctx.day_one_unlock().to_string(), "TBD");
    }

    #[test]
    fn day_one_unlock_with_no_children_is_tbd() {
        let ctx = context(vec![ResourceRef {
            resource_id: ResourceId::new(),
            kind: ResourceKind::Cohort,
            attribution: ResourceAttribution::Primary,
            position: None,
            starts_at: Some(Timestamp::now()),
        }]);
        assert_eq!(ctx.day_one_unlock(), UnlockDate::Tbd);
    }

    #[test]
    fn primary_and_secondary_split() {
        let primary = ResourceRef {
            resource_id: ResourceId::new(),
            kind: ResourceKind::Cohort,
            attribution: ResourceAttribution::Primary,
            position: None,
            starts_at: None,
        };
        let bonus = ResourceRef {
            resource_id: ResourceId::new(),
            kind: ResourceKind::Workshop,
            attribution: ResourceAttribution::StandaloneBonus,
            position: None,
            starts_at: None,
        };
        let ctx = context(vec![primary.clone(), child(1, None), bonus]);

        assert_eq!(ctx.primary(), Some(&primary));
        assert_eq!(ctx.secondary().count(), 2);
    }
}
