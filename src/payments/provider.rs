use crate::payments::error::PaymentResult;
use crate::payments::types::{
    CoinMetadata, CreateOptions, PaymentHandle, PaymentMethod, VerificationResult, VerifyRequest,
    WebhookOutcome, WebhookRequest,
};
use async_trait::async_trait;

/// One payment backend. Errors are returned, never panicked past this boundary.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn create(
        &self,
        metadata: &CoinMetadata,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle>;

    async fn verify(&self, request: &VerifyRequest) -> PaymentResult<VerificationResult>;

    /// Authenticates and decodes a raw webhook delivery.
    fn parse_webhook(&self, request: &WebhookRequest) -> PaymentResult<WebhookOutcome>;

    fn method(&self) -> PaymentMethod;
}
