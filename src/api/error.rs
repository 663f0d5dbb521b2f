//! Error response formatting for the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::payments::error::PaymentError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

fn payment_error_code(error: &PaymentError) -> &'static str {
    match error {
        PaymentError::ValidationError { .. } => "VALIDATION_ERROR",
        PaymentError::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
        PaymentError::BackendUnreachable { .. } => "BACKEND_UNREACHABLE",
        PaymentError::InvalidWebhook { .. } => "INVALID_WEBHOOK",
        PaymentError::WrongRecipient { .. } => "WRONG_RECIPIENT",
        PaymentError::NotFound { .. } => "TRANSACTION_NOT_FOUND",
        PaymentError::Unconfirmed { .. } => "TRANSACTION_UNCONFIRMED",
        PaymentError::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
        PaymentError::TransactionAlreadyClaimed { .. } => "TRANSACTION_ALREADY_CLAIMED",
        PaymentError::RateLimitError { .. } => "RATE_LIMITED",
        PaymentError::ProviderError { .. } => "PROVIDER_ERROR",
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Payment(e) => {
                StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::IntentNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        let (error, message, retryable) = match self {
            ApiError::Payment(e) => (
                payment_error_code(e).to_string(),
                e.user_message(),
                Some(e.is_retryable()),
            ),
            ApiError::IntentNotFound(id) => (
                "INTENT_NOT_FOUND".to_string(),
                format!("Payment intent '{}' was not found", id),
                Some(false),
            ),
            ApiError::BadRequest(message) => {
                ("BAD_REQUEST".to_string(), message.clone(), Some(false))
            }
        };
        ErrorResponse {
            error,
            message,
            timestamp: Utc::now().to_rfc3339(),
            retryable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!(error = %self, status = %status_code.as_u16(), "Server error occurred");
        } else {
            tracing::warn!(error = %self, status = %status_code.as_u16(), "Client error occurred");
        }

        (status_code, Json(self.to_response_body())).into_response()
    }
}
