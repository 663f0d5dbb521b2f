#![allow(dead_code)]

use async_trait::async_trait;
use memecoin_payments::chains::evm::errors::ChainResult;
use memecoin_payments::chains::evm::types::{EvmReceipt, EvmTransaction};
use memecoin_payments::chains::traits::ChainReader;
use memecoin_payments::payments::types::CoinMetadata;
use memecoin_payments::payments::utils::hmac_sha256_hex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RECEIVING: &str = "0x1111111111111111111111111111111111111111";
pub const STRANGER: &str = "0x2222222222222222222222222222222222222222";
pub const TWO_MILLI_ETHER: u128 = 2_000_000_000_000_000;

pub fn coin() -> CoinMetadata {
    CoinMetadata {
        coin_id: "coin_42".to_string(),
        coin_name: "Doge Two".to_string(),
        coin_symbol: "DOGE2".to_string(),
        network: "base-sepolia".to_string(),
        logo_url: None,
    }
}

pub fn tx_hash(n: u8) -> String {
    format!("0x{}", hex::encode([n; 32]))
}

/// `t=<unix>,v1=<hex>` header over `"<t>.<body>"`.
pub fn card_signature(secret: &str, body: &[u8]) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(body);
    let signature = hmac_sha256_hex(secret, &signed).expect("hmac should compute");
    format!("t={},v1={}", timestamp, signature)
}

pub fn hosted_signature(secret: &str, body: &[u8]) -> String {
    hmac_sha256_hex(secret, body).expect("hmac should compute")
}

/// Mounts a JSON response for `verb` on the exact `route` path.
pub async fn stub(server: &MockServer, verb: &str, route: &str, status: u16, body: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Fixed set of transfers on one network.
#[derive(Default)]
pub struct StaticChain {
    transactions: Mutex<HashMap<String, EvmTransaction>>,
    receipts: Mutex<HashMap<String, EvmReceipt>>,
}

impl StaticChain {
    pub fn transfer(self, hash: &str, to: &str, wei: u128, receipt_status: Option<&str>) -> Self {
        self.transactions.lock().unwrap().insert(
            hash.to_string(),
            EvmTransaction {
                hash: hash.to_string(),
                from: "0x3333333333333333333333333333333333333333".to_string(),
                to: Some(to.to_string()),
                value: format!("0x{:x}", wei),
                block_number: Some("0xa".to_string()),
            },
        );
        if let Some(status) = receipt_status {
            self.receipts.lock().unwrap().insert(
                hash.to_string(),
                EvmReceipt {
                    transaction_hash: hash.to_string(),
                    status: Some(status.to_string()),
                    block_number: Some("0xa".to_string()),
                },
            );
        }
        self
    }
}

#[async_trait]
impl ChainReader for StaticChain {
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
        Ok(12)
    }

    /// Every block is stamped with the current time.
    async fn block_timestamp(&self, _block_number: u64) -> ChainResult<Option<u64>> {
        Ok(Some(chrono::Utc::now().timestamp() as u64))
    }
}
