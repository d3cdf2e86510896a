//! Application layer - services and command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Services (reconciler, discount registry, coupon credit) hold the shared
//! workflows; handlers bind them to inbound triggers.

pub mod coupon_credit;
pub mod discount_registry;
pub mod handlers;
pub mod organizations;
pub mod reconciler;

pub use coupon_credit::{CouponCreditService, CreditOutcome};
pub use discount_registry::DiscountRegistry;
pub use handlers::{
    CohortSyncOutcome, CohortSyncReport, GrantOutcome, GrantPurchaseEntitlementsCommand,
    GrantPurchaseEntitlementsHandler, ProcessRefundCommand, ProcessRefundHandler,
    RedeemCouponCommand, RedeemCouponHandler, RedeemOutcome, RefundReport, SyncCohortCommand,
    SyncCohortHandler, TransferOutcome, TransferPurchaseCommand, TransferPurchaseHandler,
};
pub use organizations::ensure_personal_learner;
pub use reconciler::{GrantReport, Reconciler, UserSyncResult};
