//! API routes for bazaar-cloud

pub mod health;
pub mod seller_balance;
pub mod stripe_webhook;

use axum::routing::{get, post};
use axum::{Router, http::HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route("/stripe/webhook", post(stripe_webhook::handle_webhook));

    // Read-only ledger reporting
    let reporting = Router::new().route(
        "/api/sellers/{seller_id}/balance",
        get(seller_balance::get_balance),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .merge(reporting)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}
