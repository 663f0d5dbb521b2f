//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

use crate::payments::providers::{CardConfig, DirectWalletConfig, HostedCryptoConfig};
use crate::services::confirmation_tracker::TrackerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub payments: PaymentsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Payment backends. A backend without credentials is left as `None` and
/// never registered with the router.
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    pub card: Option<CardConfig>,
    pub hosted_crypto: Option<HostedCryptoConfig>,
    pub direct_wallet: Option<DirectWalletConfig>,
    pub tracker: TrackerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            payments: PaymentsConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        self.payments.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

fn any_var_set(keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false))
}

impl PaymentsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let card = if any_var_set(&["CARD_API_SECRET", "STRIPE_SECRET_KEY"]) {
            Some(CardConfig::from_env().map_err(|e| ConfigError::InvalidValue(e.to_string()))?)
        } else {
            None
        };
        let hosted_crypto = if any_var_set(&["HOSTED_CRYPTO_API_KEY", "COINBASE_API_KEY"]) {
            Some(
                HostedCryptoConfig::from_env()
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
            )
        } else {
            None
        };
        let direct_wallet = if any_var_set(&["RECEIVING_WALLET_ADDRESS", "PAYMENT_WALLET_ADDRESS"]) {
            Some(
                DirectWalletConfig::from_env()
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(PaymentsConfig {
            card,
            hosted_crypto,
            direct_wallet,
            tracker: TrackerConfig::from_env(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(card) = &self.card {
            if card.unit_amount <= 0 {
                return Err(ConfigError::InvalidValue("CARD_UNIT_AMOUNT".to_string()));
            }
            if card.webhook_tolerance_secs <= 0 {
                return Err(ConfigError::InvalidValue(
                    "CARD_WEBHOOK_TOLERANCE_SECS".to_string(),
                ));
            }
        }

        if let Some(hosted) = &self.hosted_crypto {
            if !hosted.base_url.starts_with("http://") && !hosted.base_url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "HOSTED_CRYPTO_BASE_URL must be a valid URL".to_string(),
                ));
            }
        }

        if let Some(wallet) = &self.direct_wallet {
            for (network, url) in &wallet.rpc_endpoints {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::InvalidValue(format!(
                        "NETWORK_RPC_ENDPOINTS entry for {} must be a valid URL",
                        network
                    )));
                }
            }
        }

        if self.tracker.intent_expiry.is_zero() {
            return Err(ConfigError::InvalidValue("INTENT_EXPIRY_SECS".to_string()));
        }

        if self.card.is_none() && self.hosted_crypto.is_none() && self.direct_wallet.is_none() {
            return Err(ConfigError::ValidationFailed(
                "no payment backend is configured".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}
