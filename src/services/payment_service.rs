//! Entry point used by the HTTP layer: creates intents through the router,
//! turns verify results and webhooks into tracker transitions, and hands
//! confirmed payments to the deployment trigger.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::router::PaymentRouter;
use crate::payments::types::{
    CoinMetadata, ConfirmationEvent, CreateOptions, IntentStatus, PaymentHandle, PaymentIntent,
    PaymentMethod, SubscriptionRequest, SubscriptionResponse, SubscriptionStatus,
    VerificationResult, VerifyRequest, WebhookAction, WebhookRequest, WebhookResponse,
};
use crate::services::confirmation_tracker::ConfirmationTracker;
use crate::services::deployment::{hand_off, DeploymentTrigger};
use crate::services::webhook_normalizer::WebhookNormalizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verification: VerificationResult,
    /// `None` when the intent is not tracked, which only happens for
    /// references created outside this service.
    pub status: Option<IntentStatus>,
    pub action: Option<WebhookAction>,
}

pub struct PaymentService {
    router: PaymentRouter,
    tracker: Arc<ConfirmationTracker>,
    trigger: Arc<dyn DeploymentTrigger>,
    webhooks: WebhookNormalizer,
}

impl PaymentService {
    pub fn new(
        router: PaymentRouter,
        tracker: Arc<ConfirmationTracker>,
        trigger: Arc<dyn DeploymentTrigger>,
    ) -> Self {
        let webhooks = WebhookNormalizer::new(router.clone(), tracker.clone(), trigger.clone());
        Self {
            router,
            tracker,
            trigger,
            webhooks,
        }
    }

    pub fn router(&self) -> &PaymentRouter {
        &self.router
    }

    pub fn tracker(&self) -> &Arc<ConfirmationTracker> {
        &self.tracker
    }

    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        self.router.list_available_methods()
    }

    /// Creates a payment with the chosen backend and starts tracking it.
    /// Nothing is tracked when the backend call fails.
    pub async fn create_payment(
        &self,
        metadata: &CoinMetadata,
        method: &str,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle> {
        metadata.validate()?;
        let handle = self
            .router
            .create_payment(metadata, method, options)
            .await
            .map_err(|e| {
                warn!(method = %method, coin_id = %metadata.coin_id, error = %e, "payment creation failed");
                e
            })?;

        self.tracker.register(PaymentIntent::from_handle(&handle)).await;
        info!(
            intent_id = %handle.intent_id,
            method = %handle.method,
            coin_id = %metadata.coin_id,
            "payment intent created"
        );
        Ok(handle)
    }

    /// Asks the backend for the current outcome and records it. A backend
    /// that reports neither paid nor failed leaves the intent pending.
    pub async fn verify_payment(
        &self,
        request: &VerifyRequest,
        method: &str,
    ) -> PaymentResult<VerifyOutcome> {
        let method = self.router.resolve(method)?;
        let reference = request.reference.trim();
        if reference.is_empty() {
            return Err(PaymentError::validation("reference is required", "reference"));
        }

        let tracked = self.tracker.touch(reference).await;
        let mut request = request.clone();
        let quoted = if method == PaymentMethod::DirectWallet {
            let intent = match tracked {
                Some(_) => self.tracker.get(reference).await,
                None => None,
            };
            let intent = intent.ok_or_else(|| {
                PaymentError::validation(format!("unknown payment intent: {}", reference), "reference")
            })?;
            bind_network(&intent, &mut request)?;
            Some(intent)
        } else {
            None
        };

        let mut verification = self.router.adapter(method)?.verify(&request).await.map_err(|e| {
            warn!(reference = %reference, method = %method, error = %e, "verification failed");
            e
        })?;
        if let Some(intent) = &quoted {
            let tx_hash = request.transaction_hash.as_deref().unwrap_or_default();
            check_transfer(intent, tx_hash, &mut verification)?;
        }

        let mut action = None;
        if verification.paid || verification.failed {
            let event = ConfirmationEvent {
                intent_id: reference.to_string(),
                method,
                paid: verification.paid,
                amount: verification.amount.clone(),
                metadata: verification.metadata.clone(),
            };
            let confirmed = match request.transaction_hash.as_deref() {
                Some(tx_hash) if verification.paid => {
                    self.tracker.record_transfer(&event, tx_hash).await?
                }
                _ => self.tracker.record_event(&event).await,
            };
            if let Some(confirmed) = confirmed {
                action = Some(WebhookAction::Deploy);
                hand_off(self.trigger.as_ref(), confirmed).await;
            }
        }

        Ok(VerifyOutcome {
            status: self.tracker.status_of(reference).await,
            verification,
            action,
        })
    }

    pub async fn handle_webhook(
        &self,
        source: &str,
        request: &WebhookRequest,
    ) -> PaymentResult<WebhookResponse> {
        self.webhooks.handle(source, request).await
    }

    /// Current view of an intent, with expiry applied.
    pub async fn intent(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.tracker.touch(intent_id).await?;
        self.tracker.get(intent_id).await
    }

    pub async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> PaymentResult<SubscriptionResponse> {
        let card = self.router.card()?;
        card.create_subscription(&request.email, &request.plan)
            .await
            .map_err(|e| {
                error!(plan = %request.plan, error = %e, "subscription creation failed");
                e
            })
    }

    pub async fn subscription_status(&self, email: &str) -> PaymentResult<SubscriptionStatus> {
        self.router.card()?.has_active_subscription(email).await
    }
}

/// Pins a direct-wallet verify to the network the intent was quoted on.
fn bind_network(intent: &PaymentIntent, request: &mut VerifyRequest) -> PaymentResult<()> {
    let Some(quoted) = intent.network.as_deref() else {
        return Ok(());
    };
    let requested = request
        .network
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty());
    if let Some(requested) = requested {
        if requested != quoted {
            return Err(PaymentError::validation(
                format!(
                    "intent {} was quoted on {}, not {}",
                    intent.intent_id, quoted, requested
                ),
                "network",
            ));
        }
    }
    request.network = Some(quoted.to_string());
    Ok(())
}

/// A transfer only counts for an intent when it was mined after the intent
/// was created and pays at least the quoted amount in the quoted currency.
fn check_transfer(
    intent: &PaymentIntent,
    tx_hash: &str,
    verification: &mut VerificationResult,
) -> PaymentResult<()> {
    let mined_at = verification.mined_at.ok_or_else(|| PaymentError::Unconfirmed {
        tx_hash: tx_hash.to_string(),
    })?;
    if mined_at.timestamp() < intent.created_at.timestamp() {
        warn!(
            intent_id = %intent.intent_id,
            mined_at = %mined_at,
            created_at = %intent.created_at,
            "transfer predates payment intent"
        );
        return Err(PaymentError::validation(
            "transaction was mined before the payment intent was created",
            "transactionHash",
        ));
    }

    if !verification.paid {
        return Ok(());
    }
    let Some(quoted) = intent.amount.as_ref() else {
        return Ok(());
    };
    let covers = match verification.amount.as_ref() {
        Some(sent) if sent.currency.eq_ignore_ascii_case(&quoted.currency) => {
            match (sent.decimal(), quoted.decimal()) {
                (Ok(sent), Ok(quoted)) => sent >= quoted,
                _ => false,
            }
        }
        _ => false,
    };
    if !covers {
        warn!(
            intent_id = %intent.intent_id,
            sent = ?verification.amount,
            quoted = ?quoted,
            "transfer does not cover quoted amount"
        );
        verification.paid = false;
        verification.failed = true;
    }
    Ok(())
}
