//! HTTP surface: payment creation and verification, backend webhooks,
//! subscriptions and health.

pub mod error;
pub mod health;
pub mod payments;
pub mod subscriptions;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use http::Request;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::services::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
}

/// Generates an `x-request-id` for requests that arrive without one.
#[derive(Clone, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(value))
    }
}

pub fn router(service: Arc<PaymentService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health::health))
        .route("/payments", post(payments::create_payment))
        .route("/payments/methods", get(payments::list_methods))
        .route("/payments/verify", post(payments::verify_payment))
        .route("/payments/{intent_id}", get(payments::get_intent))
        .route("/webhooks/{source}", post(webhooks::handle_webhook))
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route("/subscriptions/{email}", get(subscriptions::subscription_status))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
