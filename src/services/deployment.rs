//! Hand-off of confirmed payments to the coin deployment pipeline.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::payments::types::PaymentConfirmed;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("deployment queue is closed")]
    QueueClosed,
    #[error("deployment forwarding failed: {0}")]
    ForwardFailed(String),
}

/// Receives each `PaymentConfirmed` exactly once per intent.
#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    async fn trigger(&self, confirmed: PaymentConfirmed) -> Result<(), DeploymentError>;
}

/// Passes a confirmation to the trigger. The intent is already paid at this
/// point, so a failed hand-off is logged for an operator instead of returned.
pub async fn hand_off(trigger: &dyn DeploymentTrigger, confirmed: PaymentConfirmed) {
    let intent_id = confirmed.intent_id.clone();
    if let Err(e) = trigger.trigger(confirmed).await {
        error!(intent_id = %intent_id, error = %e, "failed to queue deployment for paid intent");
    }
}

pub struct ChannelDeploymentTrigger {
    sender: mpsc::Sender<PaymentConfirmed>,
}

impl ChannelDeploymentTrigger {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PaymentConfirmed>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeploymentTrigger for ChannelDeploymentTrigger {
    async fn trigger(&self, confirmed: PaymentConfirmed) -> Result<(), DeploymentError> {
        self.sender
            .send(confirmed)
            .await
            .map_err(|_| DeploymentError::QueueClosed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentWorkerConfig {
    /// Deployment service endpoint; when unset, confirmations are only logged.
    pub forward_url: Option<String>,
    pub timeout_secs: u64,
}

impl DeploymentWorkerConfig {
    pub fn from_env() -> Self {
        Self {
            forward_url: std::env::var("DEPLOYMENT_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_secs: std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

pub struct DeploymentWorker {
    receiver: mpsc::Receiver<PaymentConfirmed>,
    config: DeploymentWorkerConfig,
    http: Client,
}

impl DeploymentWorker {
    pub fn new(receiver: mpsc::Receiver<PaymentConfirmed>, config: DeploymentWorkerConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            receiver,
            config,
            http,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            forwarding = self.config.forward_url.is_some(),
            "deployment worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("deployment worker stopping");
                        break;
                    }
                }
                next = self.receiver.recv() => {
                    match next {
                        Some(confirmed) => {
                            if let Err(e) = self.handle(&confirmed).await {
                                error!(
                                    intent_id = %confirmed.intent_id,
                                    error = %e,
                                    "deployment hand-off failed; operator action required"
                                );
                            }
                        }
                        None => {
                            warn!("deployment queue closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("deployment worker stopped");
    }

    async fn handle(&self, confirmed: &PaymentConfirmed) -> Result<(), DeploymentError> {
        let coin_id = confirmed
            .metadata
            .as_ref()
            .map(|m| m.coin_id.as_str())
            .unwrap_or("unknown");
        info!(intent_id = %confirmed.intent_id, coin_id = %coin_id, "deployment requested");

        let Some(url) = &self.config.forward_url else {
            return Ok(());
        };
        let response = self
            .http
            .post(url)
            .json(confirmed)
            .send()
            .await
            .map_err(|e| DeploymentError::ForwardFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DeploymentError::ForwardFailed(format!(
                "deployment service returned {}",
                response.status()
            )));
        }
        info!(intent_id = %confirmed.intent_id, "deployment forwarded");
        Ok(())
    }
}
