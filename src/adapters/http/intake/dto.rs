//! Request/response DTOs for the event intake endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of `purchase.created` and `purchase.updated`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseEventPayload {
    pub purchase_id: Uuid,
}

/// Payload of `coupon.redeemed`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRedeemedPayload {
    pub coupon_id: Uuid,
    pub user_id: Uuid,
}

/// Payload of `refund.processed`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundProcessedPayload {
    pub charge_id: String,
}

/// Payload of `cohort.updated`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortUpdatedPayload {
    pub cohort_id: Uuid,
}

/// Payload of `purchase.transfer-requested`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequestedPayload {
    pub purchase_id: Uuid,
    pub source_user_id: Uuid,
    pub target_user_id: Uuid,
}

/// Acknowledgement returned for accepted deliveries.
#[derive(Debug, Serialize, PartialEq)]
pub struct IntakeResponse {
    /// "processed", "skipped", "duplicate", or "ignored".
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntakeResponse {
    pub fn processed() -> Self {
        Self {
            status: "processed",
            detail: None,
        }
    }

    pub fn skipped(reason: String) -> Self {
        Self {
            status: "skipped",
            detail: Some(reason),
        }
    }

    pub fn duplicate() -> Self {
        Self {
            status: "duplicate",
            detail: None,
        }
    }

    pub fn ignored(event_type: &str) -> Self {
        Self {
            status: "ignored",
            detail: Some(format!("No handler for event type {}", event_type)),
        }
    }
}

/// Error body returned for rejected deliveries.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
