use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::payments::types::{CoinMetadata, CreateOptions, PaymentMethod, VerifyRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    pub metadata: CoinMetadata,
    pub method: String,
    #[serde(default)]
    pub options: CreateOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentBody {
    pub method: String,
    #[serde(flatten)]
    pub request: VerifyRequest,
}

#[derive(Debug, Serialize)]
pub struct MethodsResponse {
    pub methods: Vec<PaymentMethod>,
}

/// POST /payments
pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<impl IntoResponse, ApiError> {
    info!(method = %body.method, coin_id = %body.metadata.coin_id, "Create payment request");
    let handle = state
        .service
        .create_payment(&body.metadata, &body.method, &body.options)
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

/// POST /payments/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(body): Json<VerifyPaymentBody>,
) -> Result<impl IntoResponse, ApiError> {
    info!(method = %body.method, reference = %body.request.reference, "Verify payment request");
    let outcome = state
        .service
        .verify_payment(&body.request, &body.method)
        .await?;
    Ok(Json(outcome))
}

/// GET /payments/{intent_id}
pub async fn get_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = state
        .service
        .intent(&intent_id)
        .await
        .ok_or(ApiError::IntentNotFound(intent_id))?;
    Ok(Json(intent))
}

/// GET /payments/methods
pub async fn list_methods(State(state): State<AppState>) -> impl IntoResponse {
    Json(MethodsResponse {
        methods: state.service.available_methods(),
    })
}
