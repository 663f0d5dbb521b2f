use crate::chains::evm::{
    errors::{ChainError, ChainResult},
    types::{
        parse_u64_quantity, EvmBlock, EvmReceipt, EvmTransaction, JsonRpcRequest, JsonRpcResponse,
    },
};
use crate::chains::traits::ChainReader;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

#[derive(Debug)]
pub struct EvmRpcClient {
    http_client: Client,
    network: String,
    rpc_url: String,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(
        network: impl Into<String>,
        rpc_url: impl Into<String>,
        request_timeout: Duration,
    ) -> ChainResult<Self> {
        let network = network.into();
        let rpc_url = rpc_url.into();
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ChainError::config_error(format!(
                "RPC URL for {} must be http(s): {}",
                network, rpc_url
            )));
        }

        let http_client = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(10)
            .user_agent("memecoin-payments/1.0")
            .build()
            .map_err(|e| ChainError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(network = %network, "EVM RPC client initialized");

        Ok(Self {
            http_client,
            network,
            rpc_url,
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ChainResult<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(network = %self.network, method = %method, "JSON-RPC call");

        let response = timeout(
            self.request_timeout,
            self.http_client.post(&self.rpc_url).json(&request).send(),
        )
        .await
        .map_err(|_| ChainError::timeout_error(self.request_timeout.as_secs()))??;

        let response = response
            .error_for_status()
            .map_err(|e| ChainError::network_error(format!("RPC HTTP error: {}", e)))?;

        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::serialization_error(format!("JSON parsing error: {}", e)))?;

        if let Some(err) = body.error {
            return Err(ChainError::RpcError {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result)
    }
}

#[async_trait]
impl ChainReader for EvmRpcClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn get_transaction(&self, tx_hash: &str) -> ChainResult<Option<EvmTransaction>> {
        self.call("eth_getTransactionByHash", serde_json::json!([tx_hash]))
            .await
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> ChainResult<Option<EvmReceipt>> {
        self.call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
            .await
    }

    async fn block_number(&self) -> ChainResult<u64> {
        let raw: Option<String> = self.call("eth_blockNumber", serde_json::json!([])).await?;
        raw.as_deref()
            .and_then(parse_u64_quantity)
            .ok_or_else(|| ChainError::serialization_error("invalid block number"))
    }

    async fn block_timestamp(&self, block_number: u64) -> ChainResult<Option<u64>> {
        let block: Option<EvmBlock> = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{:x}", block_number), false]),
            )
            .await?;
        block
            .map(|b| {
                parse_u64_quantity(&b.timestamp)
                    .ok_or_else(|| ChainError::serialization_error("invalid block timestamp"))
            })
            .transpose()
    }
}
