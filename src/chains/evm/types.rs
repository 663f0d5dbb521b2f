use alloy_primitives::utils::format_ether as format_ether_units;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTransaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
    /// Hex quantity in wei.
    pub value: String,
    #[serde(default)]
    pub block_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmReceipt {
    pub transaction_hash: String,
    /// `0x1` success, `0x0` reverted.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
}

impl EvmReceipt {
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .and_then(parse_quantity)
            .map(|v| v == U256::from(1))
            .unwrap_or(false)
    }
}

/// Header fields of `eth_getBlockByNumber` with `false` (no full transactions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmBlock {
    pub number: String,
    /// Hex quantity, unix seconds.
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Option<U256> {
    let digits = value.trim().strip_prefix("0x").unwrap_or(value.trim());
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Hex quantity that must fit a block height or timestamp.
pub fn parse_u64_quantity(value: &str) -> Option<u64> {
    parse_quantity(value).and_then(|v| u64::try_from(v).ok())
}

/// Renders wei as an ether decimal string without trailing zeros.
pub fn format_ether(wei: U256) -> String {
    let formatted = format_ether_units(wei);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// EVM addresses compare case-insensitively (checksum casing is cosmetic).
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub fn is_valid_evm_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_valid_tx_hash(hash: &str) -> bool {
    let Some(hex_part) = hash.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}
