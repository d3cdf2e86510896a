//! Entitlement domain - the unit of access the engine grants and revokes.

mod entitlement;
mod entitlement_type;
mod events;
mod source;

pub use entitlement::{
    Entitlement, EntitlementKey, META_ATTRIBUTION, META_COMMUNITY_ROLE_ID,
    META_DAY_ONE_UNLOCK_DATE, META_ELIGIBILITY_PRODUCT_ID,
};
pub use entitlement_type::EntitlementType;
pub use events::{EntitlementEvent, RoleTargetType};
pub use source::{EntitlementSource, SourceType};
