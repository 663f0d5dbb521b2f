use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use std::str::FromStr;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::payments::types::{PaymentMethod, WebhookRequest};

pub const CARD_SIGNATURE_HEADER: &str = "stripe-signature";
pub const HOSTED_CRYPTO_SIGNATURE_HEADER: &str = "x-cc-webhook-signature";

fn signature_header(method: PaymentMethod) -> Option<&'static str> {
    match method {
        PaymentMethod::Card => Some(CARD_SIGNATURE_HEADER),
        PaymentMethod::HostedCrypto => Some(HOSTED_CRYPTO_SIGNATURE_HEADER),
        PaymentMethod::DirectWallet => None,
    }
}

/// POST /webhooks/{source}
///
/// The body is kept as raw bytes so signatures are checked against exactly
/// what the backend sent.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    info!(source = %source, bytes = body.len(), "Received webhook");

    let method = PaymentMethod::from_str(&source)?;
    let signature = signature_header(method)
        .and_then(|name| headers.get(name))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    if signature.is_none() {
        warn!(source = %source, "Missing webhook signature");
    }

    let request = WebhookRequest::new(body.to_vec(), signature);
    let response = state.service.handle_webhook(&source, &request).await?;
    Ok(Json(response))
}
