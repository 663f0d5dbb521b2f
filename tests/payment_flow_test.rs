//! End-to-end payment flows through `PaymentService`
//!
//! Card backends are served by a wiremock server; direct wallet transfers
//! come from an in-memory chain reader.

mod common;

use common::*;
use memecoin_payments::chains::traits::ChainReader;
use memecoin_payments::payments::error::PaymentError;
use memecoin_payments::payments::providers::{
    CardCheckoutAdapter, CardConfig, DirectWalletAdapter, DirectWalletConfig, HostedCryptoAdapter,
    HostedCryptoConfig,
};
use memecoin_payments::payments::router::PaymentRouter;
use memecoin_payments::payments::types::{
    CreateOptions, IntentStatus, PaymentConfirmed, SubscriptionRequest, VerifyRequest,
    WebhookAction, WebhookRequest,
};
use memecoin_payments::services::{ChannelDeploymentTrigger, ConfirmationTracker, PaymentService};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use wiremock::MockServer;

const CARD_WEBHOOK_SECRET: &str = "whsec_flow";
const HOSTED_WEBHOOK_SECRET: &str = "cc_whsec_flow";

fn service(router: PaymentRouter) -> (PaymentService, mpsc::Receiver<PaymentConfirmed>) {
    let (trigger, rx) = ChannelDeploymentTrigger::new(16);
    (
        PaymentService::new(router, Arc::new(ConfirmationTracker::default()), Arc::new(trigger)),
        rx,
    )
}

fn session(payment_status: &str) -> serde_json::Value {
    json!({
        "id": "sess_1",
        "url": "https://checkout.test/pay/sess_1",
        "payment_status": payment_status,
        "status": if payment_status == "paid" { "complete" } else { "open" },
        "amount_total": 500,
        "currency": "usd",
        "metadata": {
            "coinId": "coin_42",
            "coinName": "Doge Two",
            "coinSymbol": "DOGE2",
            "network": "base-sepolia"
        }
    })
}

fn card_router(server: &MockServer) -> PaymentRouter {
    let card = CardCheckoutAdapter::new(CardConfig {
        api_secret: "sk_test_flow".to_string(),
        webhook_secret: Some(CARD_WEBHOOK_SECRET.to_string()),
        base_url: server.uri(),
        max_retries: 0,
        ..CardConfig::default()
    })
    .expect("card adapter should build");
    PaymentRouter::new().with_card(Arc::new(card))
}

fn completed_webhook() -> WebhookRequest {
    let body = serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": session("paid") }
    }))
    .expect("fixture should serialize");
    let signature = card_signature(CARD_WEBHOOK_SECRET, &body);
    WebhookRequest::new(body, Some(signature))
}

#[tokio::test]
async fn card_checkout_confirms_once_across_webhook_and_poll() {
    let server = MockServer::start().await;
    stub(&server, "POST", "/v1/checkout/sessions", 200, session("unpaid")).await;
    stub(&server, "GET", "/v1/checkout/sessions/sess_1", 200, session("unpaid")).await;
    let (service, mut deployments) = service(card_router(&server));

    let handle = service
        .create_payment(&coin(), "card", &CreateOptions::default())
        .await
        .expect("create should succeed");
    assert_eq!(handle.intent_id, "sess_1");
    assert_eq!(handle.payment_url.as_deref(), Some("https://checkout.test/pay/sess_1"));

    let pending = service
        .verify_payment(&VerifyRequest::by_reference("sess_1"), "card")
        .await
        .expect("verify should succeed");
    assert!(!pending.verification.paid);
    assert_eq!(pending.status, Some(IntentStatus::Pending));

    let received = server.received_requests().await.expect("recording is on");
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].method.to_string(), "POST");
    assert_eq!(received[0].url.path(), "/v1/checkout/sessions");
    assert!(received[0].headers.iter().any(|(name, values)| {
        name.as_str().eq_ignore_ascii_case("authorization")
            && values.iter().any(|v| v.as_str() == "Bearer sk_test_flow")
    }));
    let form = String::from_utf8_lossy(&received[0].body).to_string();
    assert!(form.contains("expires_at="));
    assert!(form.contains("metadata%5BcoinId%5D=coin_42"));
    assert_eq!(received[1].url.path(), "/v1/checkout/sessions/sess_1");

    let webhook = service
        .handle_webhook("card", &completed_webhook())
        .await
        .expect("signed webhook should be accepted");
    assert_eq!(webhook.action, Some(WebhookAction::Deploy));
    assert_eq!(webhook.metadata.expect("metadata").coin_id, "coin_42");

    server.reset().await;
    stub(&server, "GET", "/v1/checkout/sessions/sess_1", 200, session("paid")).await;
    let polled = service
        .verify_payment(&VerifyRequest::by_reference("sess_1"), "stripe")
        .await
        .expect("verify should succeed");
    assert!(polled.verification.paid);
    assert_eq!(polled.status, Some(IntentStatus::Paid));
    assert!(polled.action.is_none());

    let replay = service
        .handle_webhook("card", &completed_webhook())
        .await
        .expect("replayed webhook is still authentic");
    assert!(replay.action.is_none());

    let confirmed = deployments.recv().await.expect("one deployment");
    assert_eq!(confirmed.intent_id, "sess_1");
    assert!(deployments.try_recv().is_err());
}

#[tokio::test]
async fn card_backend_down_surfaces_unreachable_without_tracking() {
    let card = CardCheckoutAdapter::new(CardConfig {
        api_secret: "sk_test_flow".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        max_retries: 0,
        timeout_secs: 2,
        ..CardConfig::default()
    })
    .expect("card adapter should build");
    let (service, _rx) = service(PaymentRouter::new().with_card(Arc::new(card)));

    let result = service
        .create_payment(&coin(), "card", &CreateOptions::default())
        .await;
    assert!(matches!(result, Err(PaymentError::BackendUnreachable { .. })));
    assert_eq!(service.tracker().len().await, 0);
}

#[tokio::test]
async fn card_subscription_reuses_customer_and_reports_active() {
    let server = MockServer::start().await;
    stub(&server, "GET", "/v1/customers", 200, json!({ "data": [] })).await;
    stub(&server, "POST", "/v1/customers", 200, json!({ "id": "cus_1" })).await;
    stub(
        &server,
        "POST",
        "/v1/subscriptions",
        200,
        json!({
            "id": "sub_1",
            "latest_invoice": { "payment_intent": { "client_secret": "pi_1_secret" } }
        }),
    )
    .await;
    let card = CardCheckoutAdapter::new(CardConfig {
        api_secret: "sk_test_flow".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        plan_prices: HashMap::from([("premium".to_string(), "price_premium".to_string())]),
        ..CardConfig::default()
    })
    .expect("card adapter should build");
    let (service, _rx) = service(PaymentRouter::new().with_card(Arc::new(card)));

    let created = service
        .create_subscription(&SubscriptionRequest {
            email: "dev@example.com".to_string(),
            plan: "Premium".to_string(),
        })
        .await
        .expect("subscription should be created");
    assert_eq!(created.subscription_id, "sub_1");
    assert_eq!(created.client_secret.as_deref(), Some("pi_1_secret"));

    server.reset().await;
    stub(&server, "GET", "/v1/customers", 200, json!({ "data": [{ "id": "cus_1" }] })).await;
    stub(&server, "GET", "/v1/subscriptions", 200, json!({ "data": [{ "id": "sub_1" }] })).await;
    let status = service
        .subscription_status("dev@example.com")
        .await
        .expect("status lookup should succeed");
    assert!(status.active);
    assert_eq!(status.subscription_id.as_deref(), Some("sub_1"));

    let unknown = service
        .create_subscription(&SubscriptionRequest {
            email: "dev@example.com".to_string(),
            plan: "platinum".to_string(),
        })
        .await;
    assert!(matches!(unknown, Err(PaymentError::ValidationError { .. })));
}

fn hosted_delivery(event_type: &str, timeline: &[&str]) -> WebhookRequest {
    let timeline: Vec<_> = timeline.iter().map(|s| json!({ "status": s })).collect();
    let body = serde_json::to_vec(&json!({
        "id": 7,
        "event": {
            "id": "evt_7",
            "type": event_type,
            "data": {
                "id": "charge_7",
                "timeline": timeline,
                "pricing": { "local": { "amount": "5.00", "currency": "USD" } },
                "metadata": {
                    "coinId": "coin_42",
                    "coinName": "Doge Two",
                    "coinSymbol": "DOGE2",
                    "network": "base-sepolia"
                }
            }
        }
    }))
    .expect("fixture should serialize");
    let signature = hosted_signature(HOSTED_WEBHOOK_SECRET, &body);
    WebhookRequest::new(body, Some(signature))
}

fn hosted_router() -> PaymentRouter {
    let adapter = HostedCryptoAdapter::new(HostedCryptoConfig {
        api_key: "cc_test".to_string(),
        webhook_secret: Some(HOSTED_WEBHOOK_SECRET.to_string()),
        ..HostedCryptoConfig::default()
    })
    .expect("hosted crypto adapter should build");
    PaymentRouter::new().with_adapter(Arc::new(adapter))
}

#[tokio::test]
async fn hosted_crypto_failure_is_terminal() {
    let (service, mut deployments) = service(hosted_router());

    let failed = service
        .handle_webhook("coinbase", &hosted_delivery("charge:failed", &["NEW", "EXPIRED"]))
        .await
        .expect("signed webhook should be accepted");
    assert!(failed.action.is_none());
    assert_eq!(
        service.tracker().status_of("charge_7").await,
        Some(IntentStatus::Failed)
    );

    let late = service
        .handle_webhook(
            "hosted-crypto",
            &hosted_delivery("charge:confirmed", &["NEW", "CONFIRMED"]),
        )
        .await
        .expect("signed webhook should be accepted");
    assert!(late.action.is_none());
    assert!(deployments.try_recv().is_err());
}

#[tokio::test]
async fn forged_hosted_crypto_webhook_is_dropped() {
    let (service, _rx) = service(hosted_router());
    let mut request = hosted_delivery("charge:confirmed", &["NEW", "CONFIRMED"]);
    request.signature = Some(hosted_signature("wrong-secret", &request.body));

    let result = service.handle_webhook("crypto", &request).await;
    assert!(matches!(result, Err(PaymentError::InvalidWebhook { .. })));
    assert_eq!(service.tracker().status_of("charge_7").await, None);
}

#[tokio::test]
async fn carrier_pigeon_is_unsupported() {
    let (service, _rx) = service(hosted_router());
    let result = service
        .create_payment(&coin(), "carrier-pigeon", &CreateOptions::default())
        .await;
    assert!(matches!(result, Err(PaymentError::UnsupportedMethod { .. })));
    assert_eq!(service.tracker().len().await, 0);
}

fn wallet_router(chain: StaticChain) -> PaymentRouter {
    let mut readers: HashMap<String, Arc<dyn ChainReader>> = HashMap::new();
    readers.insert("ethereum".to_string(), Arc::new(chain));
    let adapter = DirectWalletAdapter::with_readers(
        DirectWalletConfig {
            receiving_address: RECEIVING.to_string(),
            ..DirectWalletConfig::default()
        },
        readers,
    )
    .expect("direct wallet adapter should build");
    PaymentRouter::new().with_adapter(Arc::new(adapter))
}

#[tokio::test]
async fn reverted_wallet_transfer_is_not_paid() {
    let hash = tx_hash(0x21);
    let chain = StaticChain::default().transfer(&hash, RECEIVING, TWO_MILLI_ETHER, Some("0x0"));
    let (service, mut deployments) = service(wallet_router(chain));

    let handle = service
        .create_payment(&coin(), "direct-wallet", &CreateOptions::default())
        .await
        .expect("create should succeed");
    assert_eq!(handle.payment_address.as_deref(), Some(RECEIVING));

    let outcome = service
        .verify_payment(&VerifyRequest::by_transaction(handle.intent_id.clone(), hash, None), "wallet")
        .await
        .expect("verify should succeed");
    assert!(!outcome.verification.paid);
    assert_eq!(outcome.status, Some(IntentStatus::Failed));
    assert!(deployments.try_recv().is_err());
}

#[tokio::test]
async fn wallet_transfer_outcomes() {
    let paid = tx_hash(0x31);
    let pending = tx_hash(0x32);
    let misdirected = tx_hash(0x33);
    let chain = StaticChain::default()
        .transfer(&paid, RECEIVING, TWO_MILLI_ETHER, Some("0x1"))
        .transfer(&pending, RECEIVING, TWO_MILLI_ETHER, None)
        .transfer(&misdirected, STRANGER, TWO_MILLI_ETHER * 50, Some("0x1"));
    let (service, mut deployments) = service(wallet_router(chain));

    let handle = service
        .create_payment(&coin(), "direct-wallet", &CreateOptions::default())
        .await
        .expect("create should succeed");
    let id = handle.intent_id.clone();

    let result = service
        .verify_payment(&VerifyRequest::by_transaction(id.clone(), tx_hash(0x99), None), "wallet")
        .await;
    assert!(matches!(result, Err(PaymentError::NotFound { .. })));

    let result = service
        .verify_payment(&VerifyRequest::by_transaction(id.clone(), misdirected, None), "wallet")
        .await;
    assert!(matches!(result, Err(PaymentError::WrongRecipient { .. })));

    let result = service
        .verify_payment(&VerifyRequest::by_transaction(id.clone(), pending, None), "wallet")
        .await;
    assert!(matches!(result, Err(PaymentError::Unconfirmed { .. })));
    assert_eq!(service.tracker().status_of(&id).await, Some(IntentStatus::Pending));

    let outcome = service
        .verify_payment(&VerifyRequest::by_transaction(id.clone(), paid, None), "wallet")
        .await
        .expect("verify should succeed");
    assert!(outcome.verification.paid);
    assert_eq!(outcome.verification.confirmations, Some(3));
    assert_eq!(outcome.action, Some(WebhookAction::Deploy));

    let confirmed = deployments.recv().await.expect("one deployment");
    assert_eq!(confirmed.intent_id, id);
    assert_eq!(confirmed.metadata.expect("metadata").coin_id, "coin_42");
}
