use crate::chains::evm::client::EvmRpcClient;
use crate::chains::evm::errors::ChainError;
use crate::chains::evm::types::{
    format_ether, is_valid_evm_address, is_valid_tx_hash, parse_quantity, parse_u64_quantity,
    same_address,
};
use crate::chains::traits::ChainReader;
use crate::logging::mask_wallet_address;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{
    CoinMetadata, CreateOptions, Money, PaymentHandle, PaymentMethod, VerificationResult,
    VerifyRequest, WebhookOutcome, WebhookRequest,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_WALLET_NETWORK: &str = "ethereum";
pub const DEFAULT_WALLET_AMOUNT: &str = "0.002";

#[derive(Debug, Clone)]
pub struct DirectWalletConfig {
    pub receiving_address: String,
    /// Network name to JSON-RPC URL.
    pub rpc_endpoints: HashMap<String, String>,
    /// Network name to expected amount in native units; missing entries use `default_amount`.
    pub amounts: HashMap<String, String>,
    pub default_amount: String,
    pub default_network: String,
    pub timeout_secs: u64,
}

impl Default for DirectWalletConfig {
    fn default() -> Self {
        Self {
            receiving_address: String::new(),
            rpc_endpoints: HashMap::new(),
            amounts: HashMap::new(),
            default_amount: DEFAULT_WALLET_AMOUNT.to_string(),
            default_network: DEFAULT_WALLET_NETWORK.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Parses `name=value,name=value` lists as used by `NETWORK_RPC_ENDPOINTS`.
pub fn parse_network_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim().to_lowercase();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some((name, value.to_string()))
        })
        .collect()
}

impl DirectWalletConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let receiving_address = std::env::var("RECEIVING_WALLET_ADDRESS")
            .or_else(|_| std::env::var("PAYMENT_WALLET_ADDRESS"))
            .map_err(|_| PaymentError::ValidationError {
                message: "RECEIVING_WALLET_ADDRESS environment variable is required".to_string(),
                field: Some("RECEIVING_WALLET_ADDRESS".to_string()),
            })?;

        let defaults = Self::default();
        Ok(Self {
            receiving_address,
            rpc_endpoints: parse_network_map(
                &std::env::var("NETWORK_RPC_ENDPOINTS").unwrap_or_default(),
            ),
            amounts: parse_network_map(&std::env::var("NETWORK_PAYMENT_AMOUNTS").unwrap_or_default()),
            default_amount: std::env::var("DIRECT_WALLET_AMOUNT").unwrap_or(defaults.default_amount),
            default_network: std::env::var("DIRECT_WALLET_NETWORK")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.default_network),
            timeout_secs: std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
        })
    }

    pub fn expected_amount(&self, network: &str) -> &str {
        self.amounts
            .get(network)
            .map(|v| v.as_str())
            .unwrap_or(&self.default_amount)
    }
}

fn native_currency(network: &str) -> String {
    match network {
        "ethereum" | "sepolia" | "base" | "base-sepolia" | "arbitrum" | "optimism" => {
            "ETH".to_string()
        }
        "polygon" | "polygon-amoy" => "MATIC".to_string(),
        "bsc" => "BNB".to_string(),
        other => other.to_uppercase(),
    }
}

pub struct DirectWalletAdapter {
    config: DirectWalletConfig,
    readers: HashMap<String, Arc<dyn ChainReader>>,
}

impl DirectWalletAdapter {
    pub fn new(config: DirectWalletConfig) -> PaymentResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut readers: HashMap<String, Arc<dyn ChainReader>> = HashMap::new();
        for (network, url) in &config.rpc_endpoints {
            let client = EvmRpcClient::new(network.clone(), url.clone(), timeout)?;
            readers.insert(network.clone(), Arc::new(client));
        }
        Self::with_readers(config, readers)
    }

    pub fn with_readers(
        config: DirectWalletConfig,
        readers: HashMap<String, Arc<dyn ChainReader>>,
    ) -> PaymentResult<Self> {
        if !is_valid_evm_address(config.receiving_address.trim()) {
            return Err(PaymentError::validation(
                "receiving wallet address must be a 0x-prefixed 20-byte hex address",
                "RECEIVING_WALLET_ADDRESS",
            ));
        }
        for (network, amount) in &config.amounts {
            Money::new(amount.clone(), native_currency(network)).validate_positive("amount")?;
        }
        if readers.is_empty() {
            warn!("no network RPC endpoints configured; direct wallet payments cannot be verified");
        }
        Ok(Self { config, readers })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(DirectWalletConfig::from_env()?)
    }

    pub fn receiving_address(&self) -> &str {
        self.config.receiving_address.trim()
    }

    fn network_for(&self, requested: Option<&str>) -> String {
        requested
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.config.default_network.clone())
    }

    fn reader(&self, network: &str) -> PaymentResult<&Arc<dyn ChainReader>> {
        self.readers.get(network).ok_or_else(|| {
            ChainError::UnknownNetwork {
                network: network.to_string(),
            }
            .into()
        })
    }

    async fn confirmations(&self, reader: &Arc<dyn ChainReader>, mined_in: Option<u64>) -> Option<u64> {
        let mined_in = mined_in?;
        match reader.block_number().await {
            Ok(head) => Some(head.saturating_sub(mined_in) + 1),
            Err(e) => {
                debug!(error = %e, "could not read block height for confirmations");
                None
            }
        }
    }

    async fn mined_at(
        &self,
        reader: &Arc<dyn ChainReader>,
        mined_in: Option<u64>,
    ) -> PaymentResult<Option<DateTime<Utc>>> {
        let Some(block) = mined_in else {
            return Ok(None);
        };
        let timestamp = reader.block_timestamp(block).await?;
        Ok(timestamp
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()))
    }
}

#[async_trait]
impl PaymentAdapter for DirectWalletAdapter {
    async fn create(
        &self,
        metadata: &CoinMetadata,
        options: &CreateOptions,
    ) -> PaymentResult<PaymentHandle> {
        metadata.validate()?;
        let network = self.network_for(options.network.as_deref());
        self.reader(&network)?;

        let amount = self.config.expected_amount(&network).to_string();
        let address = self.receiving_address().to_string();
        let intent_id = format!("dw_{}", Uuid::new_v4().simple());
        info!(
            intent_id = %intent_id,
            network = %network,
            address = %mask_wallet_address(&address),
            "direct wallet intent allocated"
        );

        Ok(PaymentHandle {
            instructions: Some(format!(
                "Send {} {} to {}",
                amount,
                network.to_uppercase(),
                address
            )),
            amount: Money::new(amount, native_currency(&network)),
            intent_id,
            method: PaymentMethod::DirectWallet,
            payment_url: None,
            payment_address: Some(address),
            network: Some(network),
            metadata: metadata.clone(),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> PaymentResult<VerificationResult> {
        let tx_hash = request
            .transaction_hash
            .as_deref()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PaymentError::validation("transaction hash is required", "transactionHash"))?;
        if !is_valid_tx_hash(&tx_hash) {
            return Err(PaymentError::validation(
                format!("malformed transaction hash: {}", tx_hash),
                "transactionHash",
            ));
        }

        let network = self.network_for(request.network.as_deref());
        let reader = self.reader(&network)?;

        let (tx, receipt) = futures::try_join!(
            reader.get_transaction(&tx_hash),
            reader.get_transaction_receipt(&tx_hash)
        )?;

        let tx = tx.ok_or_else(|| PaymentError::NotFound {
            tx_hash: tx_hash.clone(),
        })?;

        let recipient = tx.to.clone().unwrap_or_default();
        if !same_address(&recipient, self.receiving_address()) {
            warn!(
                tx_hash = %tx_hash,
                recipient = %mask_wallet_address(&recipient),
                "direct wallet payment sent to wrong address"
            );
            return Err(PaymentError::WrongRecipient {
                expected: self.receiving_address().to_string(),
                actual: recipient,
            });
        }

        let receipt = receipt.ok_or_else(|| PaymentError::Unconfirmed {
            tx_hash: tx_hash.clone(),
        })?;

        let wei = parse_quantity(&tx.value).ok_or_else(|| PaymentError::ProviderError {
            provider: "evm_rpc".to_string(),
            message: format!("invalid transaction value: {}", tx.value),
            provider_code: None,
            retryable: false,
        })?;
        let value = format_ether(wei);
        let expected = self.config.expected_amount(&network);

        let sufficient = match (BigDecimal::from_str(&value), BigDecimal::from_str(expected)) {
            (Ok(sent), Ok(wanted)) => sent >= wanted,
            _ => false,
        };
        let succeeded = receipt.succeeded();
        if succeeded && !sufficient {
            warn!(tx_hash = %tx_hash, sent = %value, expected = %expected, "direct wallet payment below expected amount");
        }

        let mined_in = receipt.block_number.as_deref().and_then(parse_u64_quantity);
        let mined_at = self.mined_at(reader, mined_in).await?;
        let confirmations = self.confirmations(reader, mined_in).await;
        let paid = succeeded && sufficient;
        info!(tx_hash = %tx_hash, network = %network, paid, "direct wallet transaction verified");

        Ok(VerificationResult {
            reference: request.reference.clone(),
            paid,
            failed: !paid,
            amount: Some(Money::new(value, native_currency(&network))),
            metadata: None,
            from: Some(tx.from),
            confirmations,
            mined_at,
        })
    }

    fn parse_webhook(&self, _request: &WebhookRequest) -> PaymentResult<WebhookOutcome> {
        Err(PaymentError::invalid_webhook(
            "direct wallet payments are confirmed by verify, not webhooks",
        ))
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::DirectWallet
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::chains::evm::errors::ChainResult;
    use crate::chains::evm::types::{EvmReceipt, EvmTransaction};
    use crate::chains::traits::ChainReader;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub const RECEIVING: &str = "0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa";
    pub const STRANGER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    pub fn tx_hash(n: u8) -> String {
        format!("0x{}", hex::encode([n; 32]))
    }

    /// In-memory chain keyed by lowercase transaction hash.
    #[derive(Default)]
    pub struct MockChain {
        pub transactions: Mutex<HashMap<String, EvmTransaction>>,
        pub receipts: Mutex<HashMap<String, EvmReceipt>>,
        pub head: u64,
        /// Fixed block time; unset means blocks are stamped with the current time.
        pub block_time: Mutex<Option<u64>>,
    }

    impl MockChain {
        pub fn with_head(head: u64) -> Self {
            Self {
                head,
                ..Self::default()
            }
        }

        pub fn add_transfer(&self, hash: &str, to: &str, wei: u128, receipt_status: Option<&str>) {
            self.transactions.lock().unwrap().insert(
                hash.to_string(),
                EvmTransaction {
                    hash: hash.to_string(),
                    from: "0xcccccccccccccccccccccccccccccccccccccccc".to_string(),
                    to: Some(to.to_string()),
                    value: format!("0x{:x}", wei),
                    block_number: Some("0x64".to_string()),
                },
            );
            if let Some(status) = receipt_status {
                self.receipts.lock().unwrap().insert(
                    hash.to_string(),
                    EvmReceipt {
                        transaction_hash: hash.to_string(),
                        status: Some(status.to_string()),
                        block_number: Some("0x64".to_string()),
                    },
                );
            }
        }
    }

    #[async_trait]
    impl ChainReader for MockChain {
        fn network(&self) -> &str {
            "ethereum"
        }

        async fn get_transaction(&self, tx_hash: &str) -> ChainResult<Option<EvmTransaction>> {
            Ok(self.transactions.lock().unwrap().get(tx_hash).cloned())
        }

        async fn get_transaction_receipt(&self, tx_hash: &str) -> ChainResult<Option<EvmReceipt>> {
            Ok(self.receipts.lock().unwrap().get(tx_hash).cloned())
        }

        async fn block_number(&self) -> ChainResult<u64> {
            Ok(self.head)
        }

        async fn block_timestamp(&self, _block_number: u64) -> ChainResult<Option<u64>> {
            let fixed = *self.block_time.lock().unwrap();
            Ok(Some(fixed.unwrap_or_else(|| chrono::Utc::now().timestamp() as u64)))
        }
    }
}
