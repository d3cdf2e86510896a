//! Command handlers - one per inbound trigger.
//!
//! Each handler owns the full workflow for its trigger: load state through
//! ports, resolve desired entitlements, apply through the reconciler, emit
//! events. All of them are safe to re-run; the durable-execution layer
//! retries on retriable errors.

pub mod grant_purchase_entitlements;
pub mod process_refund;
pub mod redeem_coupon;
pub mod sync_cohort;
pub mod transfer_purchase;

pub use grant_purchase_entitlements::{
    GrantOutcome, GrantPurchaseEntitlementsCommand, GrantPurchaseEntitlementsHandler,
};
pub use process_refund::{ProcessRefundCommand, ProcessRefundHandler, RefundReport};
pub use redeem_coupon::{RedeemCouponCommand, RedeemCouponHandler, RedeemOutcome};
pub use sync_cohort::{CohortSyncOutcome, CohortSyncReport, SyncCohortCommand, SyncCohortHandler};
pub use transfer_purchase::{TransferOutcome, TransferPurchaseCommand, TransferPurchaseHandler};
