use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{
    CoinMetadata, ConfirmationEvent, CreateOptions, Money, PaymentHandle, PaymentMethod,
    SubscriptionResponse, SubscriptionStatus, VerificationResult, VerifyRequest, WebhookOutcome,
    WebhookRequest,
};
use crate::payments::utils::{
    hmac_sha256_hex, object_url, secure_eq, Auth, PaymentHttpClient, RequestBody,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Window the backend accepts for a checkout session's `expires_at`.
pub const MIN_SESSION_EXPIRY_SECS: u64 = 30 * 60;
pub const MAX_SESSION_EXPIRY_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct CardConfig {
    pub api_secret: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Checkout price in minor units.
    pub unit_amount: i64,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
    /// Subscription plan name (lowercase) to backend price id.
    pub plan_prices: HashMap<String, String>,
    /// Lifetime of a checkout session; kept equal to the intent expiry.
    pub session_expiry_secs: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            api_secret: String::new(),
            webhook_secret: None,
            base_url: "https://api.stripe.com".to_string(),
            success_url: "https://yourdomain.com/success".to_string(),
            cancel_url: "https://yourdomain.com/cancel".to_string(),
            unit_amount: 500,
            currency: "usd".to_string(),
            webhook_tolerance_secs: 300,
            plan_prices: HashMap::new(),
            session_expiry_secs: 3600,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl CardConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_secret = std::env::var("CARD_API_SECRET")
            .or_else(|_| std::env::var("STRIPE_SECRET_KEY"))
            .map_err(|_| PaymentError::ValidationError {
                message: "CARD_API_SECRET environment variable is required".to_string(),
                field: Some("CARD_API_SECRET".to_string()),
            })?;

        let defaults = Self::default();
        let plan_prices = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix("CARD_PRICE_")
                    .map(|plan| (plan.to_lowercase(), value))
            })
            .collect();

        Ok(Self {
            webhook_secret: std::env::var("CARD_WEBHOOK_SECRET")
                .ok()
                .or_else(|| std::env::var("STRIPE_WEBHOOK_SECRET").ok()),
            base_url: std::env::var("CARD_BASE_URL").unwrap_or(defaults.base_url),
            success_url: std::env::var("CARD_SUCCESS_URL").unwrap_or(defaults.success_url),
            cancel_url: std::env::var("CARD_CANCEL_URL").unwrap_or(defaults.cancel_url),
            unit_amount: std::env::var("CARD_UNIT_AMOUNT")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(defaults.unit_amount),
            currency: std::env::var("CARD_CURRENCY").unwrap_or(defaults.currency),
            webhook_tolerance_secs: std::env::var("CARD_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(defaults.webhook_tolerance_secs),
            plan_prices,
            session_expiry_secs: defaults.session_expiry_secs,
            timeout_secs: std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("PAYMENT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
            api_secret,
        })
    }
}

/// Parsed `t=<unix>,v1=<hex>` signature header. Several `v1` entries may be
/// present while the backend rotates secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> PaymentResult<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(value)) => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        PaymentError::invalid_webhook("signature timestamp is not a number")
                    })?);
                }
                (Some("v1"), Some(value)) => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| PaymentError::invalid_webhook("signature timestamp missing"))?;
        if signatures.is_empty() {
            return Err(PaymentError::invalid_webhook("no v1 signature in header"));
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

pub struct CardCheckoutAdapter {
    config: CardConfig,
    http: PaymentHttpClient,
}

impl CardCheckoutAdapter {
    pub fn new(config: CardConfig) -> PaymentResult<Self> {
        if config.api_secret.trim().is_empty() {
            return Err(PaymentError::validation(
                "card API secret must not be empty",
                "CARD_API_SECRET",
            ));
        }
        let http = PaymentHttpClient::new(
            "card",
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CardConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn webhook_secret(&self) -> &str {
        self.config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.api_secret)
    }

    /// Form body for a checkout session created at `now` (unix seconds).
    pub fn checkout_form(
        &self,
        metadata: &CoinMetadata,
        options: &CreateOptions,
        now: i64,
    ) -> Vec<(String, String)> {
        let lifetime = self
            .config
            .session_expiry_secs
            .clamp(MIN_SESSION_EXPIRY_SECS, MAX_SESSION_EXPIRY_SECS);
        let mut form = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.config.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("Deploy {} (${})", metadata.coin_name, metadata.coin_symbol),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                "Meme coin blockchain deployment".to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                self.config.unit_amount.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), "payment".to_string()),
            (
                "expires_at".to_string(),
                (now + lifetime as i64).to_string(),
            ),
            (
                "success_url".to_string(),
                options
                    .success_url
                    .clone()
                    .unwrap_or_else(|| self.config.success_url.clone()),
            ),
            (
                "cancel_url".to_string(),
                options
                    .cancel_url
                    .clone()
                    .unwrap_or_else(|| self.config.cancel_url.clone()),
            ),
            ("metadata[coinId]".to_string(), metadata.coin_id.clone()),
            ("metadata[coinName]".to_string(), metadata.coin_name.clone()),
            ("metadata[coinSymbol]".to_string(), metadata.coin_symbol.clone()),
            ("metadata[network]".to_string(), metadata.network.clone()),
        ];
        if let Some(logo) = metadata.logo_url.as_ref().filter(|v| !v.is_empty()) {
            form.push((
                "line_items[0][price_data][product_data][images][0]".to_string(),
                logo.clone(),
            ));
        }
        form
    }

    /// Checks the signature header against the raw body. The timestamp must be
    /// within the configured tolerance of `now`.
    pub fn verify_signature(&self, payload: &[u8], header: &str, now: i64) -> PaymentResult<()> {
        let header = SignatureHeader::parse(header)?;
        let age = now - header.timestamp;
        if age.abs() > self.config.webhook_tolerance_secs {
            warn!(age_secs = age, "card webhook timestamp outside tolerance");
            return Err(PaymentError::invalid_webhook(format!(
                "signature timestamp outside tolerance ({} seconds)",
                age
            )));
        }

        let mut signed = format!("{}.", header.timestamp).into_bytes();
        signed.extend_from_slice(payload);
        let expected = hmac_sha256_hex(self.webhook_secret(), &signed)
            .ok_or_else(|| PaymentError::invalid_webhook("unusable webhook secret"))?;

        let matched = header
            .signatures
            .iter()
            .any(|candidate| secure_eq(expected.as_bytes(), candidate.trim().as_bytes()));
        if !matched {
            return Err(PaymentError::invalid_webhook("invalid card signature"));
        }
        Ok(())
    }

    async fn find_customer(&self, email: &str) -> PaymentResult<Option<String>> {
        let url = reqwest::Url::parse_with_params(
            &self.endpoint("/v1/customers"),
            &[("email", email), ("limit", "1")],
        )
        .map_err(|e| PaymentError::validation(format!("invalid customer lookup: {}", e), "email"))?;

        let list: CardList<CardCustomer> = self
            .http
            .request_json(
                reqwest::Method::GET,
                url.as_str(),
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    async fn find_or_create_customer(&self, email: &str) -> PaymentResult<String> {
        if let Some(existing) = self.find_customer(email).await? {
            return Ok(existing);
        }
        let form = vec![("email".to_string(), email.to_string())];
        let customer: CardCustomer = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/customers"),
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Form(&form),
                &[],
            )
            .await?;
        info!(customer_id = %customer.id, "card customer created");
        Ok(customer.id)
    }

    pub async fn create_subscription(
        &self,
        email: &str,
        plan: &str,
    ) -> PaymentResult<SubscriptionResponse> {
        if email.trim().is_empty() {
            return Err(PaymentError::validation("email is required", "email"));
        }
        let price = self
            .config
            .plan_prices
            .get(&plan.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| {
                PaymentError::validation(format!("no price configured for plan {}", plan), "plan")
            })?;

        let customer_id = self.find_or_create_customer(email.trim()).await?;
        let form = vec![
            ("customer".to_string(), customer_id),
            ("items[0][price]".to_string(), price),
            (
                "payment_behavior".to_string(),
                "default_incomplete".to_string(),
            ),
            (
                "expand[0]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        let subscription: CardSubscription = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/subscriptions"),
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Form(&form),
                &[],
            )
            .await?;
        info!(subscription_id = %subscription.id, plan = %plan, "card subscription created");

        let client_secret = subscription
            .latest_invoice
            .as_ref()
            .and_then(|inv| inv.get("payment_intent"))
            .and_then(|pi| pi.get("client_secret"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());

        Ok(SubscriptionResponse {
            subscription_id: subscription.id,
            client_secret,
        })
    }

    pub async fn has_active_subscription(&self, email: &str) -> PaymentResult<SubscriptionStatus> {
        let Some(customer_id) = self.find_customer(email.trim()).await? else {
            return Ok(SubscriptionStatus {
                active: false,
                subscription_id: None,
            });
        };

        let url = reqwest::Url::parse_with_params(
            &self.endpoint("/v1/subscriptions"),
            &[
                ("customer", customer_id.as_str()),
                ("status", "active"),
                ("limit", "1"),
            ],
        )
        .map_err(|e| PaymentError::validation(format!("invalid subscription lookup: {}", e), "email"))?;

        let list: CardList<CardSubscription> = self
            .http
            .request_json(
                reqwest::Method::GET,
                url.as_str(),
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Empty,
                &[],
            )
            .await?;
        let first = list.data.into_iter().next();
        Ok(SubscriptionStatus {
            active: first.is_some(),
            subscription_id: first.map(|s| s.id),
        })
    }
}

pub(crate) fn session_to_verification(session: CardCheckoutSession) -> VerificationResult {
    let paid = session.payment_status.as_deref() == Some("paid");
    let failed = !paid && session.status.as_deref() == Some("expired");
    let currency = session.currency.clone().unwrap_or_else(|| "usd".to_string());
    VerificationResult {
        amount: session
            .amount_total
            .map(|total| Money::from_minor_units(total, currency)),
        metadata: session
            .metadata
            .as_ref()
            .and_then(CoinMetadata::from_backend_metadata),
        reference: session.id,
        paid,
        failed,
        from: None,
        confirmations: None,
        mined_at: None,
    }
}

#[async_trait]
impl PaymentAdapter for CardCheckoutAdapter {
    async fn create(
        &self,
        metadata: &CoinMetadata,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle> {
        metadata.validate()?;
        let form = self.checkout_form(metadata, options, chrono::Utc::now().timestamp());

        let session: CardCheckoutSession = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/checkout/sessions"),
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Form(&form),
                &[],
            )
            .await?;
        info!(session_id = %session.id, coin_id = %metadata.coin_id, "card checkout session created");

        Ok(PaymentHandle {
            intent_id: session.id,
            method: PaymentMethod::Card,
            amount: Money::from_minor_units(self.config.unit_amount, self.config.currency.clone()),
            payment_url: session.url,
            payment_address: None,
            network: None,
            instructions: None,
            metadata: metadata.clone(),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> PaymentResult<VerificationResult> {
        let session_id = request.reference.trim();
        if session_id.is_empty() {
            return Err(PaymentError::validation("session id is required", "reference"));
        }
        let url = object_url(&self.config.base_url, "/v1/checkout/sessions", session_id, "reference")?;
        let session: CardCheckoutSession = self
            .http
            .request_json(
                reqwest::Method::GET,
                &url,
                Auth::Bearer(&self.config.api_secret),
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(session_to_verification(session))
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> PaymentResult<WebhookOutcome> {
        let header = request
            .signature
            .as_deref()
            .ok_or_else(|| PaymentError::invalid_webhook("missing card signature header"))?;
        self.verify_signature(&request.body, header, chrono::Utc::now().timestamp())?;

        let event: CardWebhookEvent = serde_json::from_slice(&request.body)
            .map_err(|e| PaymentError::invalid_webhook(format!("invalid webhook JSON payload: {}", e)))?;

        if event.event_type != CHECKOUT_COMPLETED {
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let session: CardCheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|e| PaymentError::invalid_webhook(format!("invalid checkout session: {}", e)))?;
        let verification = session_to_verification(session);

        Ok(WebhookOutcome::Confirmation(ConfirmationEvent {
            intent_id: verification.reference,
            method: PaymentMethod::Card,
            paid: true,
            amount: verification.amount,
            metadata: verification.metadata,
        }))
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct CardWebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: CardWebhookData,
}

#[derive(Debug, Deserialize)]
struct CardWebhookData {
    object: JsonValue,
}

#[derive(Debug, Deserialize)]
struct CardList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CardCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CardSubscription {
    id: String,
    #[serde(default)]
    latest_invoice: Option<JsonValue>,
}
