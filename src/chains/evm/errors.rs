use crate::payments::error::PaymentError;
use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("No RPC endpoint configured for network {network}")]
    UnknownNetwork { network: String },
}

impl ChainError {
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn timeout_error(seconds: u64) -> Self {
        Self::TimeoutError { seconds }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::TimeoutError { seconds: 0 }
        } else {
            ChainError::network_error(err.to_string())
        }
    }
}

impl From<ChainError> for PaymentError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NetworkError { .. } | ChainError::TimeoutError { .. } => {
                PaymentError::unreachable(err.to_string())
            }
            ChainError::UnknownNetwork { network } => PaymentError::ValidationError {
                message: format!("no RPC endpoint configured for network {}", network),
                field: Some("network".to_string()),
            },
            other => PaymentError::ProviderError {
                provider: "evm_rpc".to_string(),
                message: other.to_string(),
                provider_code: None,
                retryable: false,
            },
        }
    }
}
