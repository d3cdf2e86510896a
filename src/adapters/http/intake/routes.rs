//! Axum router configuration for the event intake.

use axum::routing::{get, post};
use axum::Router;
use http::HeaderName;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{handle_inbound_event, health, IntakeAppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the intake router.
///
/// # Routes
///
/// - `GET /health` - liveness probe
/// - `POST /events/inbound` - signed event deliveries from the bus
///
/// Every request gets an `x-request-id` (generated if the bus did not send
/// one) which is echoed on the response and attached to the trace span.
pub fn intake_router(state: IntakeAppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    Router::new()
        .route("/health", get(health))
        .route("/events/inbound", post(handle_inbound_event))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .with_state(state)
}
