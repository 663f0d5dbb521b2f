use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::payments::types::SubscriptionRequest;

/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required".to_string()));
    }
    info!(plan = %body.plan, "Create subscription request");
    let subscription = state.service.create_subscription(&body).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /subscriptions/{email}
pub async fn subscription_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.service.subscription_status(&email).await?;
    Ok(Json(status))
}
