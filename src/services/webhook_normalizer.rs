use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::payments::error::PaymentResult;
use crate::payments::router::PaymentRouter;
use crate::payments::types::{
    WebhookAction, WebhookOutcome, WebhookRequest, WebhookResponse,
};
use crate::services::confirmation_tracker::ConfirmationTracker;
use crate::services::deployment::{hand_off, DeploymentTrigger};

/// Authenticates and decodes backend webhooks, then feeds the decoded
/// confirmation to the tracker. Rejected webhooks never reach the tracker.
pub struct WebhookNormalizer {
    router: PaymentRouter,
    tracker: Arc<ConfirmationTracker>,
    trigger: Arc<dyn DeploymentTrigger>,
}

impl WebhookNormalizer {
    pub fn new(
        router: PaymentRouter,
        tracker: Arc<ConfirmationTracker>,
        trigger: Arc<dyn DeploymentTrigger>,
    ) -> Self {
        Self {
            router,
            tracker,
            trigger,
        }
    }

    /// Decodes a webhook for the declared source without touching any state.
    pub fn normalize(&self, source: &str, request: &WebhookRequest) -> PaymentResult<WebhookOutcome> {
        let method = self.router.resolve(source)?;
        let adapter = self.router.adapter(method)?;
        adapter.parse_webhook(request).map_err(|e| {
            warn!(source = %source, error = %e, "webhook rejected");
            e
        })
    }

    pub async fn handle(&self, source: &str, request: &WebhookRequest) -> PaymentResult<WebhookResponse> {
        let event = match self.normalize(source, request)? {
            WebhookOutcome::Ignored { event_type } => {
                debug!(source = %source, event_type = %event_type, "webhook event ignored");
                return Ok(WebhookResponse::no_action());
            }
            WebhookOutcome::Confirmation(event) => event,
        };

        info!(
            source = %source,
            intent_id = %event.intent_id,
            paid = event.paid,
            "webhook confirmation received"
        );

        match self.tracker.record_event(&event).await {
            Some(confirmed) => {
                let response = WebhookResponse {
                    success: true,
                    action: Some(WebhookAction::Deploy),
                    intent_id: Some(confirmed.intent_id.clone()),
                    metadata: confirmed.metadata.clone(),
                };
                hand_off(self.trigger.as_ref(), confirmed).await;
                Ok(response)
            }
            None => Ok(WebhookResponse {
                success: true,
                action: None,
                intent_id: Some(event.intent_id),
                metadata: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::error::PaymentError;
    use crate::payments::providers::{CardCheckoutAdapter, CardConfig};
    use crate::payments::types::IntentStatus;
    use crate::payments::utils::hmac_sha256_hex;
    use crate::services::deployment::ChannelDeploymentTrigger;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn normalizer() -> (
        WebhookNormalizer,
        Arc<ConfirmationTracker>,
        tokio::sync::mpsc::Receiver<crate::payments::types::PaymentConfirmed>,
    ) {
        let card = CardCheckoutAdapter::new(CardConfig {
            api_secret: "sk_test".to_string(),
            webhook_secret: Some(SECRET.to_string()),
            ..Default::default()
        })
        .expect("card adapter should build");
        let router = PaymentRouter::new().with_card(Arc::new(card));
        let tracker = Arc::new(ConfirmationTracker::default());
        let (trigger, rx) = ChannelDeploymentTrigger::new(8);
        (
            WebhookNormalizer::new(router, tracker.clone(), Arc::new(trigger)),
            tracker,
            rx,
        )
    }

    fn signed(body: &[u8]) -> WebhookRequest {
        let timestamp = chrono::Utc::now().timestamp();
        let mut signed_payload = format!("{}.", timestamp).into_bytes();
        signed_payload.extend_from_slice(body);
        let signature = hmac_sha256_hex(SECRET, &signed_payload).expect("hmac");
        WebhookRequest::new(body.to_vec(), Some(format!("t={},v1={}", timestamp, signature)))
    }

    fn completed_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "sess_1",
                "payment_status": "paid",
                "amount_total": 500,
                "currency": "usd",
                "metadata": {
                    "coinId": "c1",
                    "coinName": "Doge Two",
                    "coinSymbol": "DOGE2",
                    "network": "base-sepolia"
                }
            }}
        }))
        .expect("fixture should serialize")
    }

    #[tokio::test]
    async fn completed_checkout_requests_one_deployment() {
        let (normalizer, tracker, mut rx) = normalizer();
        let request = signed(&completed_body());

        let first = normalizer.handle("card", &request).await.expect("valid webhook");
        assert_eq!(first.action, Some(WebhookAction::Deploy));
        assert_eq!(first.metadata.expect("metadata").coin_id, "c1");

        let replay = normalizer.handle("card", &request).await.expect("valid webhook");
        assert!(replay.success);
        assert_eq!(replay.action, None);

        assert_eq!(tracker.status_of("sess_1").await, Some(IntentStatus::Paid));
        assert_eq!(rx.recv().await.map(|c| c.intent_id), Some("sess_1".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tampered_webhook_never_reaches_tracker() {
        let (normalizer, tracker, _rx) = normalizer();
        let mut request = signed(&completed_body());
        request.body = completed_body().into_iter().rev().collect();

        let result = normalizer.handle("card", &request).await;
        assert!(matches!(result, Err(PaymentError::InvalidWebhook { .. })));
        assert_eq!(tracker.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_source_is_unsupported() {
        let (normalizer, _tracker, _rx) = normalizer();
        let result = normalizer.normalize("carrier-pigeon", &signed(b"{}"));
        assert!(matches!(result, Err(PaymentError::UnsupportedMethod { .. })));
    }

    #[tokio::test]
    async fn other_event_types_are_acknowledged_without_action() {
        let (normalizer, tracker, _rx) = normalizer();
        let body = serde_json::to_vec(&json!({
            "type": "checkout.session.expired",
            "data": { "object": { "id": "sess_9" } }
        }))
        .expect("fixture should serialize");

        let response = normalizer.handle("stripe", &signed(&body)).await.expect("valid webhook");
        assert!(response.success);
        assert_eq!(response.action, None);
        assert_eq!(tracker.len().await, 0);
    }
}
