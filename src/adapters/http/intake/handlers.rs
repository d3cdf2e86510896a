//! HTTP handlers for the event intake endpoint.
//!
//! The event bus delivers signed events here with at-least-once semantics.
//! The pipeline is: verify signature, route by event type, claim the
//! `(event, handler)` pair for dedup, decode the payload, run the command
//! handler. Retriable failures release the claim and return 5xx so the bus
//! redelivers; terminal failures keep the claim and return 4xx.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::adapters::events::{InboundEvent, InboundSignatureVerifier, SignatureError};
use crate::application::handlers::{
    CohortSyncOutcome, GrantOutcome, GrantPurchaseEntitlementsCommand,
    GrantPurchaseEntitlementsHandler, ProcessRefundCommand, ProcessRefundHandler,
    RedeemCouponCommand, RedeemCouponHandler, SyncCohortCommand, SyncCohortHandler,
    TransferOutcome, TransferPurchaseCommand, TransferPurchaseHandler,
};
use crate::domain::foundation::{
    CouponId, DomainError, EventId, PurchaseId, ResourceId, UserId,
};
use crate::ports::ProcessedEventStore;

use super::dto::{
    CohortUpdatedPayload, CouponRedeemedPayload, ErrorResponse, IntakeResponse,
    PurchaseEventPayload, RefundProcessedPayload, TransferRequestedPayload,
};

/// Signature header carried by every delivery.
pub const SIGNATURE_HEADER: &str = "x-event-signature";

/// Shared application state for the intake router.
#[derive(Clone)]
pub struct IntakeAppState {
    pub verifier: Arc<InboundSignatureVerifier>,
    pub processed_events: Arc<dyn ProcessedEventStore>,
    pub grant_handler: Arc<GrantPurchaseEntitlementsHandler>,
    pub redeem_handler: Arc<RedeemCouponHandler>,
    pub refund_handler: Arc<ProcessRefundHandler>,
    pub sync_handler: Arc<SyncCohortHandler>,
    pub transfer_handler: Arc<TransferPurchaseHandler>,
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// `POST /events/inbound`
pub async fn handle_inbound_event(
    State(state): State<IntakeAppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Missing {} header", SIGNATURE_HEADER),
            }),
        )
            .into_response();
    };

    let event = match state.verifier.verify_and_parse(body.as_bytes(), header) {
        Ok(event) => event,
        Err(e) => return signature_error_response(e),
    };

    let event_id = EventId::from_string(event.id.clone());
    match event.event_type.as_str() {
        "purchase.created" | "purchase.updated" => {
            dispatch(&state, &event, &event_id, "grant_purchase_entitlements", |payload: PurchaseEventPayload| {
                let handler = state.grant_handler.clone();
                async move {
                    let outcome = handler
                        .handle(GrantPurchaseEntitlementsCommand {
                            purchase_id: PurchaseId::from_uuid(payload.purchase_id),
                        })
                        .await?;
                    Ok(match outcome {
                        GrantOutcome::Granted { .. } => IntakeResponse::processed(),
                        GrantOutcome::Skipped { reason } => IntakeResponse::skipped(reason),
                    })
                }
            })
            .await
        }
        "coupon.redeemed" => {
            dispatch(&state, &event, &event_id, "redeem_coupon", |payload: CouponRedeemedPayload| {
                let handler = state.redeem_handler.clone();
                async move {
                    handler
                        .handle(RedeemCouponCommand {
                            coupon_id: CouponId::from_uuid(payload.coupon_id),
                            user_id: UserId::from_uuid(payload.user_id),
                        })
                        .await?;
                    Ok(IntakeResponse::processed())
                }
            })
            .await
        }
        "refund.processed" => {
            dispatch(&state, &event, &event_id, "process_refund", |payload: RefundProcessedPayload| {
                let handler = state.refund_handler.clone();
                async move {
                    handler
                        .handle(ProcessRefundCommand {
                            charge_id: payload.charge_id,
                        })
                        .await?;
                    Ok(IntakeResponse::processed())
                }
            })
            .await
        }
        "cohort.updated" => {
            dispatch(&state, &event, &event_id, "sync_cohort", |payload: CohortUpdatedPayload| {
                let handler = state.sync_handler.clone();
                async move {
                    let outcome = handler
                        .handle(SyncCohortCommand {
                            cohort_id: ResourceId::from_uuid(payload.cohort_id),
                        })
                        .await?;
                    Ok(match outcome {
                        CohortSyncOutcome::Completed(report) if report.failed.is_empty() => {
                            IntakeResponse::processed()
                        }
                        CohortSyncOutcome::Completed(report) => {
                            // Partial failure: surface as retriable so the
                            // failed users get another pass. Converged users
                            // are no-ops on redelivery.
                            return Err(DomainError::new(
                                crate::domain::foundation::ErrorCode::InternalError,
                                format!("{} users failed to sync", report.failed.len()),
                            ));
                        }
                        CohortSyncOutcome::Skipped { reason } => IntakeResponse::skipped(reason),
                    })
                }
            })
            .await
        }
        "purchase.transfer-requested" => {
            dispatch(&state, &event, &event_id, "transfer_purchase", |payload: TransferRequestedPayload| {
                let handler = state.transfer_handler.clone();
                async move {
                    let outcome = handler
                        .handle(TransferPurchaseCommand {
                            purchase_id: PurchaseId::from_uuid(payload.purchase_id),
                            source_user_id: UserId::from_uuid(payload.source_user_id),
                            target_user_id: UserId::from_uuid(payload.target_user_id),
                        })
                        .await?;
                    Ok(match outcome {
                        TransferOutcome::Transferred { .. } => IntakeResponse::processed(),
                        TransferOutcome::NotTransferable { message } => {
                            IntakeResponse::skipped(message)
                        }
                    })
                }
            })
            .await
        }
        other => {
            info!(event_type = other, event_id = %event.id, "Ignoring unhandled event type");
            (StatusCode::OK, Json(IntakeResponse::ignored(other))).into_response()
        }
    }
}

/// Decodes the payload, claims the event for the handler, runs the
/// workflow, and maps the result onto HTTP semantics.
async fn dispatch<P, F, Fut>(
    state: &IntakeAppState,
    event: &InboundEvent,
    event_id: &EventId,
    handler_name: &str,
    run: F,
) -> Response
where
    P: DeserializeOwned,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<IntakeResponse, DomainError>>,
{
    let payload: P = match serde_json::from_value(event.payload.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Malformed event payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Malformed payload: {}", e),
                }),
            )
                .into_response();
        }
    };

    match state.processed_events.try_claim(event_id, handler_name).await {
        Ok(true) => {}
        Ok(false) => {
            info!(event_id = %event.id, handler_name, "Duplicate delivery");
            return (StatusCode::OK, Json(IntakeResponse::duplicate())).into_response();
        }
        Err(e) => return domain_error_response(e),
    }

    match run(payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) if e.is_retriable() => {
            // Give the claim back so the bus can redeliver.
            if let Err(release_err) = state.processed_events.release(event_id, handler_name).await {
                warn!(event_id = %event.id, error = %release_err, "Failed to release event claim");
            }
            domain_error_response(e)
        }
        Err(e) => domain_error_response(e),
    }
}

fn signature_error_response(error: SignatureError) -> Response {
    let status = match error {
        SignatureError::InvalidSignature | SignatureError::TimestampOutOfRange => {
            StatusCode::UNAUTHORIZED
        }
        SignatureError::InvalidTimestamp | SignatureError::ParseError(_) => {
            StatusCode::BAD_REQUEST
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn domain_error_response(error: DomainError) -> Response {
    let status = if error.is_retriable() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
