use crate::config::PaymentsConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::providers::{CardCheckoutAdapter, DirectWalletAdapter, HostedCryptoAdapter};
use crate::payments::types::{
    CoinMetadata, CreateOptions, PaymentHandle, PaymentMethod, VerificationResult, VerifyRequest,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Dispatches create/verify to the adapter registered for a method. No
/// retries or caching happen here.
#[derive(Clone, Default)]
pub struct PaymentRouter {
    adapters: HashMap<PaymentMethod, Arc<dyn PaymentAdapter>>,
    card: Option<Arc<CardCheckoutAdapter>>,
}

impl PaymentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PaymentAdapter>) -> Self {
        self.adapters.insert(adapter.method(), adapter);
        self
    }

    /// Registers the card adapter both for dispatch and for its subscription calls.
    pub fn with_card(mut self, card: Arc<CardCheckoutAdapter>) -> Self {
        self.adapters.insert(PaymentMethod::Card, card.clone());
        self.card = Some(card);
        self
    }

    /// Builds adapters for every backend that has configuration. Backends
    /// without it stay unregistered and fail as unsupported.
    pub fn from_config(config: &PaymentsConfig) -> PaymentResult<Self> {
        let mut router = Self::new();
        if let Some(card) = &config.card {
            let mut card = card.clone();
            card.session_expiry_secs = config.tracker.intent_expiry.as_secs();
            router = router.with_card(Arc::new(CardCheckoutAdapter::new(card)?));
        }
        if let Some(hosted) = &config.hosted_crypto {
            router = router.with_adapter(Arc::new(HostedCryptoAdapter::new(hosted.clone())?));
        }
        if let Some(wallet) = &config.direct_wallet {
            router = router.with_adapter(Arc::new(DirectWalletAdapter::new(wallet.clone())?));
        }
        info!(methods = ?router.list_available_methods(), "payment router initialized");
        Ok(router)
    }

    pub fn resolve(&self, method: &str) -> PaymentResult<PaymentMethod> {
        let parsed = PaymentMethod::from_str(method)?;
        if !self.adapters.contains_key(&parsed) {
            return Err(PaymentError::UnsupportedMethod {
                method: method.to_string(),
            });
        }
        Ok(parsed)
    }

    pub fn adapter(&self, method: PaymentMethod) -> PaymentResult<Arc<dyn PaymentAdapter>> {
        self.adapters
            .get(&method)
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedMethod {
                method: method.to_string(),
            })
    }

    pub fn card(&self) -> PaymentResult<Arc<CardCheckoutAdapter>> {
        self.card.clone().ok_or_else(|| PaymentError::UnsupportedMethod {
            method: PaymentMethod::Card.to_string(),
        })
    }

    pub async fn create_payment(
        &self,
        metadata: &CoinMetadata,
        method: &str,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle> {
        let method = self.resolve(method)?;
        debug!(method = %method, coin_id = %metadata.coin_id, "dispatching create");
        self.adapter(method)?.create(metadata, options).await
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyRequest,
        method: &str,
    ) -> PaymentResult<VerificationResult> {
        let method = self.resolve(method)?;
        debug!(method = %method, reference = %request.reference, "dispatching verify");
        self.adapter(method)?.verify(request).await
    }

    pub fn list_available_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::all()
            .into_iter()
            .filter(|m| self.adapters.contains_key(m))
            .collect()
    }
}
