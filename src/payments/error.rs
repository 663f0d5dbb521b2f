use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Unsupported payment method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Backend unreachable: {message}")]
    BackendUnreachable { message: String },

    #[error("Invalid webhook: {message}")]
    InvalidWebhook { message: String },

    #[error("Payment sent to wrong address: expected {expected}, got {actual}")]
    WrongRecipient { expected: String, actual: String },

    #[error("Transaction not found: {tx_hash}")]
    NotFound { tx_hash: String },

    #[error("Transaction not yet confirmed: {tx_hash}")]
    Unconfirmed { tx_hash: String },

    #[error("Intent {intent_id} is already finalized")]
    AlreadyFinalized { intent_id: String },

    #[error("Transaction {tx_hash} is already bound to intent {intent_id}")]
    TransactionAlreadyClaimed { tx_hash: String, intent_id: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: &str) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::InvalidWebhook {
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::BackendUnreachable {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::UnsupportedMethod { .. } => false,
            PaymentError::BackendUnreachable { .. } => true,
            PaymentError::InvalidWebhook { .. } => false,
            PaymentError::WrongRecipient { .. } => false,
            PaymentError::NotFound { .. } => false,
            PaymentError::Unconfirmed { .. } => true,
            PaymentError::AlreadyFinalized { .. } => false,
            PaymentError::TransactionAlreadyClaimed { .. } => false,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::UnsupportedMethod { .. } => 400,
            PaymentError::BackendUnreachable { .. } => 503,
            PaymentError::InvalidWebhook { .. } => 401,
            PaymentError::WrongRecipient { .. } => 422,
            PaymentError::NotFound { .. } => 404,
            PaymentError::Unconfirmed { .. } => 409,
            PaymentError::AlreadyFinalized { .. } => 200,
            PaymentError::TransactionAlreadyClaimed { .. } => 409,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::ProviderError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::UnsupportedMethod { method } => {
                format!("Payment method '{}' is not supported", method)
            }
            PaymentError::BackendUnreachable { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::InvalidWebhook { .. } => "Invalid webhook signature".to_string(),
            PaymentError::WrongRecipient { .. } => "Payment sent to wrong address".to_string(),
            PaymentError::NotFound { .. } => "Transaction not found".to_string(),
            PaymentError::Unconfirmed { .. } => {
                "Transaction is not confirmed yet. Please retry shortly".to_string()
            }
            // Never surfaced as a failure; a paid intent stays paid.
            PaymentError::AlreadyFinalized { .. } => "Payment already confirmed".to_string(),
            PaymentError::TransactionAlreadyClaimed { .. } => {
                "Transaction was already used for another payment".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to payment provider. Please retry shortly".to_string()
            }
            PaymentError::ProviderError { .. } => "Payment provider returned an error".to_string(),
        }
    }
}
