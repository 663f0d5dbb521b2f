use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{
    CoinMetadata, ConfirmationEvent, CreateOptions, Money, PaymentHandle, PaymentMethod,
    VerificationResult, VerifyRequest, WebhookOutcome, WebhookRequest,
};
use crate::payments::utils::{object_url, verify_hmac_sha256_hex, Auth, PaymentHttpClient, RequestBody};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

pub const CHARGE_CONFIRMED: &str = "charge:confirmed";
pub const CHARGE_FAILED: &str = "charge:failed";
const API_VERSION: &str = "2018-03-22";

#[derive(Debug, Clone)]
pub struct HostedCryptoConfig {
    pub api_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub redirect_url: String,
    pub price: Money,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HostedCryptoConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.commerce.coinbase.com".to_string(),
            redirect_url: "https://yourdomain.com".to_string(),
            price: Money::new("5.00", "USD"),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl HostedCryptoConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key = std::env::var("HOSTED_CRYPTO_API_KEY")
            .or_else(|_| std::env::var("COINBASE_API_KEY"))
            .map_err(|_| PaymentError::ValidationError {
                message: "HOSTED_CRYPTO_API_KEY environment variable is required".to_string(),
                field: Some("HOSTED_CRYPTO_API_KEY".to_string()),
            })?;

        let defaults = Self::default();
        Ok(Self {
            api_key,
            webhook_secret: std::env::var("HOSTED_CRYPTO_WEBHOOK_SECRET")
                .ok()
                .or_else(|| std::env::var("COINBASE_WEBHOOK_SECRET").ok()),
            base_url: std::env::var("HOSTED_CRYPTO_BASE_URL").unwrap_or(defaults.base_url),
            redirect_url: std::env::var("HOSTED_CRYPTO_REDIRECT_URL")
                .unwrap_or(defaults.redirect_url),
            price: Money::new(
                std::env::var("HOSTED_CRYPTO_PRICE").unwrap_or(defaults.price.amount),
                std::env::var("HOSTED_CRYPTO_CURRENCY").unwrap_or(defaults.price.currency),
            ),
            timeout_secs: std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("PAYMENT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
        })
    }
}

pub struct HostedCryptoAdapter {
    config: HostedCryptoConfig,
    http: PaymentHttpClient,
}

impl HostedCryptoAdapter {
    pub fn new(config: HostedCryptoConfig) -> PaymentResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PaymentError::validation(
                "hosted crypto API key must not be empty",
                "HOSTED_CRYPTO_API_KEY",
            ));
        }
        config.price.validate_positive("HOSTED_CRYPTO_PRICE")?;
        if config.webhook_secret.is_none() {
            warn!("HOSTED_CRYPTO_WEBHOOK_SECRET not set; hosted crypto webhooks will be rejected");
        }
        let http = PaymentHttpClient::new(
            "hosted_crypto",
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(HostedCryptoConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn headers(&self) -> [(&str, &str); 2] {
        [
            ("X-CC-Api-Key", self.config.api_key.as_str()),
            ("X-CC-Version", API_VERSION),
        ]
    }

    pub fn charge_payload(&self, metadata: &CoinMetadata, options: &CreateOptions) -> JsonValue {
        let redirect_url = options
            .redirect_url
            .clone()
            .unwrap_or_else(|| self.config.redirect_url.clone());
        serde_json::json!({
            "name": format!("Deploy {}", metadata.coin_name),
            "description": format!("Deploy {} to blockchain", metadata.coin_symbol),
            "pricing_type": "fixed_price",
            "local_price": {
                "amount": self.config.price.amount,
                "currency": self.config.price.currency,
            },
            "metadata": metadata.to_backend_metadata(),
            "cancel_url": format!("{}/cancel", redirect_url),
            "redirect_url": redirect_url,
        })
    }
}

pub(crate) fn charge_to_verification(charge: HostedCharge) -> VerificationResult {
    let paid = charge
        .timeline
        .iter()
        .any(|entry| matches!(entry.status.as_str(), "CONFIRMED" | "COMPLETED"));
    let failed = !paid
        && charge
            .timeline
            .last()
            .map(|entry| matches!(entry.status.as_str(), "EXPIRED" | "CANCELED"))
            .unwrap_or(false);

    VerificationResult {
        amount: charge
            .pricing
            .as_ref()
            .and_then(|p| p.get("local"))
            .and_then(|local| serde_json::from_value::<Money>(local.clone()).ok()),
        metadata: charge
            .metadata
            .as_ref()
            .and_then(CoinMetadata::from_backend_metadata),
        reference: charge.id,
        paid,
        failed,
        from: None,
        confirmations: None,
        mined_at: None,
    }
}

#[async_trait]
impl PaymentAdapter for HostedCryptoAdapter {
    async fn create(
        &self,
        metadata: &CoinMetadata,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle> {
        metadata.validate()?;
        let payload = self.charge_payload(metadata, options);

        let raw: HostedEnvelope<HostedCharge> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/charges"),
                Auth::None,
                RequestBody::Json(&payload),
                &self.headers(),
            )
            .await?;
        let charge = raw.data;
        info!(charge_id = %charge.id, coin_id = %metadata.coin_id, "hosted crypto charge created");

        Ok(PaymentHandle {
            intent_id: charge.id,
            method: PaymentMethod::HostedCrypto,
            amount: self.config.price.clone(),
            payment_url: charge.hosted_url,
            payment_address: None,
            network: None,
            instructions: None,
            metadata: metadata.clone(),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> PaymentResult<VerificationResult> {
        let charge_id = request.reference.trim();
        if charge_id.is_empty() {
            return Err(PaymentError::validation("charge id is required", "reference"));
        }
        let url = object_url(&self.config.base_url, "/charges", charge_id, "reference")?;
        let raw: HostedEnvelope<HostedCharge> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &url,
                Auth::None,
                RequestBody::Empty,
                &self.headers(),
            )
            .await?;
        Ok(charge_to_verification(raw.data))
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> PaymentResult<WebhookOutcome> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| PaymentError::invalid_webhook("hosted crypto webhook secret not configured"))?;
        let signature = request
            .signature
            .as_deref()
            .ok_or_else(|| PaymentError::invalid_webhook("missing hosted crypto signature header"))?;
        if !verify_hmac_sha256_hex(&request.body, secret, signature) {
            return Err(PaymentError::invalid_webhook("invalid hosted crypto signature"));
        }

        let delivery: HostedWebhookDelivery = serde_json::from_slice(&request.body)
            .map_err(|e| PaymentError::invalid_webhook(format!("invalid webhook JSON payload: {}", e)))?;
        let event = delivery.event;

        let paid = match event.event_type.as_str() {
            CHARGE_CONFIRMED => true,
            CHARGE_FAILED => false,
            _ => {
                return Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type,
                })
            }
        };

        let charge: HostedCharge = serde_json::from_value(event.data)
            .map_err(|e| PaymentError::invalid_webhook(format!("invalid charge object: {}", e)))?;
        let verification = charge_to_verification(charge);

        Ok(WebhookOutcome::Confirmation(ConfirmationEvent {
            intent_id: verification.reference,
            method: PaymentMethod::HostedCrypto,
            paid,
            amount: verification.amount,
            metadata: verification.metadata,
        }))
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::HostedCrypto
    }
}

#[derive(Debug, Deserialize)]
struct HostedEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostedCharge {
    id: String,
    #[serde(default)]
    hosted_url: Option<String>,
    #[serde(default)]
    timeline: Vec<HostedTimelineEntry>,
    #[serde(default)]
    pricing: Option<JsonValue>,
    #[serde(default)]
    metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct HostedTimelineEntry {
    status: String,
}

#[derive(Debug, Deserialize)]
struct HostedWebhookDelivery {
    event: HostedWebhookEvent,
}

#[derive(Debug, Deserialize)]
struct HostedWebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::utils::hmac_sha256_hex;

    fn adapter(webhook_secret: Option<&str>) -> HostedCryptoAdapter {
        HostedCryptoAdapter::new(HostedCryptoConfig {
            api_key: "cc_test".to_string(),
            webhook_secret: webhook_secret.map(|s| s.to_string()),
            ..HostedCryptoConfig::default()
        })
        .expect("adapter init should succeed")
    }

    fn delivery(event_type: &str) -> String {
        serde_json::json!({
            "id": 1,
            "event": {
                "id": "evt_1",
                "type": event_type,
                "data": {
                    "id": "charge_1",
                    "code": "ABCD",
                    "timeline": [{"status": "NEW"}, {"status": "CONFIRMED"}],
                    "pricing": {"local": {"amount": "5.00", "currency": "USD"}},
                    "metadata": {"coinId": "c9", "coinName": "Moon", "coinSymbol": "MOON", "network": "ethereum"}
                }
            }
        })
        .to_string()
    }

    fn signed(body: String, secret: &str) -> WebhookRequest {
        let signature = hmac_sha256_hex(secret, body.as_bytes()).expect("hmac should compute");
        WebhookRequest::new(body.into_bytes(), Some(signature))
    }

    #[test]
    fn confirmed_charge_yields_confirmation() {
        let adapter = adapter(Some("cc_whsec"));
        let outcome = adapter
            .parse_webhook(&signed(delivery(CHARGE_CONFIRMED), "cc_whsec"))
            .expect("webhook should parse");
        match outcome {
            WebhookOutcome::Confirmation(event) => {
                assert_eq!(event.intent_id, "charge_1");
                assert!(event.paid);
                assert_eq!(event.amount, Some(Money::new("5.00", "USD")));
                assert_eq!(event.metadata.expect("metadata").network, "ethereum");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn failed_charge_yields_unpaid_event_and_others_are_ignored() {
        let adapter = adapter(Some("cc_whsec"));
        let failed = adapter
            .parse_webhook(&signed(delivery(CHARGE_FAILED), "cc_whsec"))
            .expect("webhook should parse");
        assert!(matches!(failed, WebhookOutcome::Confirmation(ref e) if !e.paid));

        let created = adapter
            .parse_webhook(&signed(delivery("charge:created"), "cc_whsec"))
            .expect("webhook should parse");
        assert!(matches!(created, WebhookOutcome::Ignored { .. }));
    }

    #[test]
    fn forged_or_unsigned_deliveries_are_rejected() {
        let adapter = adapter(Some("cc_whsec"));
        let forged = adapter.parse_webhook(&signed(delivery(CHARGE_CONFIRMED), "attacker"));
        assert!(matches!(forged, Err(PaymentError::InvalidWebhook { .. })));

        let unsigned = adapter.parse_webhook(&WebhookRequest::new(
            delivery(CHARGE_CONFIRMED).into_bytes(),
            None,
        ));
        assert!(matches!(unsigned, Err(PaymentError::InvalidWebhook { .. })));
    }

    #[test]
    fn webhooks_are_rejected_without_configured_secret() {
        let adapter = adapter(None);
        let result = adapter.parse_webhook(&signed(delivery(CHARGE_CONFIRMED), ""));
        assert!(matches!(result, Err(PaymentError::InvalidWebhook { .. })));
    }

    #[test]
    fn timeline_maps_to_verification() {
        let pending: HostedCharge = serde_json::from_value(serde_json::json!({
            "id": "charge_2",
            "timeline": [{"status": "NEW"}, {"status": "PENDING"}]
        }))
        .expect("charge should deserialize");
        let result = charge_to_verification(pending);
        assert!(!result.paid);
        assert!(!result.failed);

        let expired: HostedCharge = serde_json::from_value(serde_json::json!({
            "id": "charge_3",
            "timeline": [{"status": "NEW"}, {"status": "EXPIRED"}]
        }))
        .expect("charge should deserialize");
        assert!(charge_to_verification(expired).failed);

        let completed: HostedCharge = serde_json::from_value(serde_json::json!({
            "id": "charge_4",
            "timeline": [{"status": "NEW"}, {"status": "COMPLETED"}],
            "pricing": {"local": {"amount": "5.00", "currency": "USD"}}
        }))
        .expect("charge should deserialize");
        let result = charge_to_verification(completed);
        assert!(result.paid);
        assert_eq!(result.amount.expect("amount").amount, "5.00");
    }

    #[test]
    fn charge_payload_uses_fixed_price_and_cancel_suffix() {
        let adapter = adapter(Some("cc_whsec"));
        let metadata = CoinMetadata {
            coin_id: "c9".to_string(),
            coin_name: "Moon".to_string(),
            coin_symbol: "MOON".to_string(),
            network: "ethereum".to_string(),
            logo_url: None,
        };
        let payload = adapter.charge_payload(&metadata, &CreateOptions::default());
        assert_eq!(payload["pricing_type"], "fixed_price");
        assert_eq!(payload["local_price"]["amount"], "5.00");
        assert_eq!(payload["cancel_url"], "https://yourdomain.com/cancel");
        assert_eq!(payload["metadata"]["coinId"], "c9");
    }

    #[tokio::test]
    async fn verify_rejects_reference_that_escapes_the_charge_path() {
        use wiremock::{matchers::any, Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        let adapter = HostedCryptoAdapter::new(HostedCryptoConfig {
            api_key: "cc_test".to_string(),
            base_url: server.uri(),
            ..HostedCryptoConfig::default()
        })
        .expect("adapter init should succeed");

        let result = adapter
            .verify(&VerifyRequest::by_reference("../charges?limit=100"))
            .await;
        assert!(matches!(result, Err(PaymentError::ValidationError { .. })));
        let received = server.received_requests().await.unwrap_or_default();
        assert!(received.is_empty());
    }
}
