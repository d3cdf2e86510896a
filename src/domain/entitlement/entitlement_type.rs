//! Entitlement type classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Named entitlement types the engine manages.
///
/// A closed set: the reconciliation engine only understands content access,
/// community roles, and purchase credits. Anything else is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementType {
    /// Unlocks a content resource (cohort, workshop, section, event).
    ContentAccess,
    /// Entitles the user to a community-platform role (e.g. a Discord role).
    CommunityRole,
    /// A credit applicable toward a future purchase.
    ApplyCredit,
}

impl EntitlementType {
    /// Stable slug used in persistence and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementType::ContentAccess => "content_access",
            EntitlementType::CommunityRole => "community_role",
            EntitlementType::ApplyCredit => "apply_credit",
        }
    }
}

impl fmt::Display for EntitlementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntitlementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content_access" => Ok(EntitlementType::ContentAccess),
            "community_role" => Ok(EntitlementType::CommunityRole),
            "apply_credit" => Ok(EntitlementType::ApplyCredit),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unknown entitlement type: {}", other),
            )),
        }
    }
}
