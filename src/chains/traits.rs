use crate::chains::evm::errors::ChainResult;
use crate::chains::evm::types::{EvmReceipt, EvmTransaction};
use async_trait::async_trait;

/// Read-only view of an EVM network
///
/// Implemented by the JSON-RPC client; tests substitute an in-memory chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Network name this reader talks to (e.g. "ethereum", "base-sepolia")
    fn network(&self) -> &str;

    /// Transaction by hash, `None` if the node does not know it
    async fn get_transaction(&self, tx_hash: &str) -> ChainResult<Option<EvmTransaction>>;

    /// Receipt by hash, `None` while the transaction is not mined
    async fn get_transaction_receipt(&self, tx_hash: &str) -> ChainResult<Option<EvmReceipt>>;

    /// Latest block height
    async fn block_number(&self) -> ChainResult<u64>;

    /// Unix timestamp of a block, `None` if the node does not know it
    async fn block_timestamp(&self, block_number: u64) -> ChainResult<Option<u64>>;
}
