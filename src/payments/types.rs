use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

pub const DEFAULT_NETWORK: &str = "base-sepolia";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    HostedCrypto,
    DirectWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::HostedCrypto => "hosted-crypto",
            PaymentMethod::DirectWallet => "direct-wallet",
        }
    }

    pub fn all() -> [PaymentMethod; 3] {
        [
            PaymentMethod::Card,
            PaymentMethod::HostedCrypto,
            PaymentMethod::DirectWallet,
        ]
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" | "stripe" => Ok(PaymentMethod::Card),
            "hosted-crypto" | "hosted_crypto" | "crypto" | "coinbase" => {
                Ok(PaymentMethod::HostedCrypto)
            }
            "direct-wallet" | "direct_wallet" | "direct" | "wallet" => {
                Ok(PaymentMethod::DirectWallet)
            }
            _ => Err(PaymentError::UnsupportedMethod {
                method: value.to_string(),
            }),
        }
    }
}

/// What gets deployed once the intent is paid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoinMetadata {
    pub coin_id: String,
    pub coin_name: String,
    pub coin_symbol: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

impl CoinMetadata {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.coin_id.trim().is_empty() {
            return Err(PaymentError::validation("coinId is required", "coinId"));
        }
        if self.coin_name.trim().is_empty() {
            return Err(PaymentError::validation("coinName is required", "coinName"));
        }
        if self.coin_symbol.trim().is_empty() {
            return Err(PaymentError::validation(
                "coinSymbol is required",
                "coinSymbol",
            ));
        }
        Ok(())
    }

    /// Flat string map attached to backend objects so it survives the round trip.
    pub fn to_backend_metadata(&self) -> JsonValue {
        serde_json::json!({
            "coinId": self.coin_id,
            "coinName": self.coin_name,
            "coinSymbol": self.coin_symbol,
            "network": self.network,
        })
    }

    /// Reads metadata echoed back by a backend. Only `coinId` is mandatory.
    pub fn from_backend_metadata(value: &JsonValue) -> Option<Self> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        };
        let coin_id = field("coinId").filter(|v| !v.trim().is_empty())?;
        Some(Self {
            coin_id,
            coin_name: field("coinName").unwrap_or_default(),
            coin_symbol: field("coinSymbol").unwrap_or_default(),
            network: field("network").unwrap_or_else(default_network),
            logo_url: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
        }
    }

    /// Formats an amount expressed in minor units (cents) as a two-decimal string.
    pub fn from_minor_units(minor: i64, currency: impl Into<String>) -> Self {
        let sign = if minor < 0 { "-" } else { "" };
        let abs = minor.unsigned_abs();
        Self::new(format!("{}{}.{:02}", sign, abs / 100, abs % 100), currency)
    }

    pub fn decimal(&self) -> Result<BigDecimal, PaymentError> {
        BigDecimal::from_str(self.amount.trim()).map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some("amount".to_string()),
        })
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed = self.decimal().map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some(field.to_string()),
        })?;
        if parsed <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

/// Caller-supplied knobs for `create`. Unset fields fall back to adapter config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub redirect_url: Option<String>,
    pub network: Option<String>,
}

/// What `create` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub intent_id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    pub payment_url: Option<String>,
    pub payment_address: Option<String>,
    pub network: Option<String>,
    pub instructions: Option<String>,
    pub metadata: CoinMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Session id, charge id, or the locally allocated direct-wallet intent id.
    pub reference: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

impl VerifyRequest {
    pub fn by_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            transaction_hash: None,
            network: None,
        }
    }

    pub fn by_transaction(
        reference: impl Into<String>,
        transaction_hash: impl Into<String>,
        network: Option<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            transaction_hash: Some(transaction_hash.into()),
            network,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub reference: String,
    pub paid: bool,
    /// The backend reports an outcome that can no longer become paid.
    pub failed: bool,
    pub amount: Option<Money>,
    pub metadata: Option<CoinMetadata>,
    pub from: Option<String>,
    pub confirmations: Option<u64>,
    /// Block time of an on-chain transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub intent_id: String,
    pub method: Option<PaymentMethod>,
    pub amount: Option<Money>,
    pub metadata: Option<CoinMetadata>,
    /// Chain the payment was quoted on (direct wallet only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub status: IntentStatus,
    pub transaction_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn pending(
        intent_id: impl Into<String>,
        method: Option<PaymentMethod>,
        amount: Option<Money>,
        metadata: Option<CoinMetadata>,
    ) -> Self {
        let now = Utc::now();
        Self {
            intent_id: intent_id.into(),
            method,
            amount,
            metadata,
            network: None,
            status: IntentStatus::Pending,
            transaction_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_handle(handle: &PaymentHandle) -> Self {
        let mut intent = Self::pending(
            handle.intent_id.clone(),
            Some(handle.method),
            Some(handle.amount.clone()),
            Some(handle.metadata.clone()),
        );
        intent.network = handle.network.clone();
        intent
    }
}

/// Backend-agnostic outcome decoded from a webhook or a verify call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationEvent {
    pub intent_id: String,
    pub method: PaymentMethod,
    pub paid: bool,
    pub amount: Option<Money>,
    pub metadata: Option<CoinMetadata>,
}

/// Emitted once per intent on its pending→paid transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmed {
    pub intent_id: String,
    pub metadata: Option<CoinMetadata>,
    pub amount: Option<Money>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub signature: Option<String>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Vec<u8>>, signature: Option<String>) -> Self {
        Self {
            signature,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Confirmation(ConfirmationEvent),
    /// Authentic but irrelevant event (e.g. `charge:created`).
    Ignored { event_type: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Deploy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub action: Option<WebhookAction>,
    pub intent_id: Option<String>,
    pub metadata: Option<CoinMetadata>,
}

impl WebhookResponse {
    pub fn no_action() -> Self {
        Self {
            success: true,
            action: None,
            intent_id: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub email: String,
    #[serde(default = "default_plan")]
    pub plan: String,
}

fn default_plan() -> String {
    "premium".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub active: bool,
    pub subscription_id: Option<String>,
}
