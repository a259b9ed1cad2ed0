use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolkitError};

/// JSON-RPC request sent to the node
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC response from the node
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Node-reported sync progress; only present while the node is syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub starting_block: u64,
    pub current_block: u64,
    pub highest_block: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncingObject {
    #[serde(default)]
    starting_block: Option<String>,
    current_block: String,
    highest_block: String,
}

impl SyncProgress {
    /// Parse an `eth_syncing` result: `false` means synced.
    pub fn from_result(value: serde_json::Value) -> Result<Option<Self>> {
        match value {
            serde_json::Value::Bool(false) | serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(_) => {
                let obj: SyncingObject = serde_json::from_value(value)
                    .map_err(|e| ToolkitError::invalid_response("eth_syncing", e))?;
                let starting_block = match obj.starting_block {
                    Some(ref hex) => parse_quantity("eth_syncing", hex)?,
                    None => 0,
                };
                Ok(Some(SyncProgress {
                    starting_block,
                    current_block: parse_quantity("eth_syncing", &obj.current_block)?,
                    highest_block: parse_quantity("eth_syncing", &obj.highest_block)?,
                }))
            }
            other => Err(ToolkitError::invalid_response(
                "eth_syncing",
                format!("unexpected result {}", other),
            )),
        }
    }
}

/// Block scope accepted by state-reading methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockId {
    #[default]
    Latest,
    Earliest,
    Pending,
    Number(u64),
}

impl BlockId {
    pub fn to_param(self) -> String {
        match self {
            BlockId::Latest => "latest".to_string(),
            BlockId::Earliest => "earliest".to_string(),
            BlockId::Pending => "pending".to_string(),
            BlockId::Number(n) => format!("0x{:x}", n),
        }
    }

    /// Parse a block tag or number ("latest", "0x1b4", "436").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(BlockId::Latest),
            "earliest" => Some(BlockId::Earliest),
            "pending" => Some(BlockId::Pending),
            _ => {
                if let Some(hex) = s.strip_prefix("0x") {
                    u64::from_str_radix(hex, 16).ok().map(BlockId::Number)
                } else {
                    s.parse::<u64>().ok().map(BlockId::Number)
                }
            }
        }
    }
}

/// Message for `eth_call` / `eth_estimateGas`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl CallRequest {
    pub fn new(from: Address, to: Option<Address>, data: &[u8]) -> Self {
        Self {
            from,
            to,
            data: Some(format!("0x{}", hex::encode(data))),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// A zero gas limit is left off the wire so the node picks its own cap.
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = (gas > 0).then(|| format!("0x{:x}", gas));
        self
    }
}

/// Decode a hex quantity (`0x2a`) into a u64.
pub fn parse_quantity(method: &str, hex: &str) -> Result<u64> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| ToolkitError::invalid_response(method, format!("quantity {} lacks 0x prefix", hex)))?;
    if digits.is_empty() {
        return Err(ToolkitError::invalid_response(method, "empty quantity"));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ToolkitError::invalid_response(method, format!("quantity {}: {}", hex, e)))
}

/// Decode hex data (`0x...`) into bytes.
pub fn parse_data(method: &str, hex: &str) -> Result<Vec<u8>> {
    hex::decode(hex.strip_prefix("0x").unwrap_or(hex))
        .map_err(|e| ToolkitError::invalid_response(method, format!("data {}: {}", hex, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("eth_blockNumber", "0x2a").unwrap(), 42);
        assert_eq!(parse_quantity("eth_blockNumber", "0x0").unwrap(), 0);
        assert!(parse_quantity("eth_blockNumber", "2a").is_err());
        assert!(parse_quantity("eth_blockNumber", "0x").is_err());
        assert!(parse_quantity("eth_blockNumber", "0xzz").is_err());
    }

    #[test]
    fn test_sync_progress_synced() {
        assert_eq!(SyncProgress::from_result(json!(false)).unwrap(), None);
    }

    #[test]
    fn test_sync_progress_syncing() {
        let progress = SyncProgress::from_result(json!({
            "startingBlock": "0x0",
            "currentBlock": "0x10",
            "highestBlock": "0x20"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(progress.current_block, 16);
        assert_eq!(progress.highest_block, 32);
        assert!(SyncProgress::from_result(json!("yes")).is_err());
    }

    #[test]
    fn test_block_id() {
        assert_eq!(BlockId::Number(436).to_param(), "0x1b4");
        assert_eq!(BlockId::parse("0x1b4"), Some(BlockId::Number(436)));
        assert_eq!(BlockId::parse("436"), Some(BlockId::Number(436)));
        assert_eq!(BlockId::parse("pending"), Some(BlockId::Pending));
        assert_eq!(BlockId::parse("soon"), None);
    }

    #[test]
    fn test_call_request_serialization() {
        let request = CallRequest::new(Address::ZERO, Some(Address::ZERO), &[0x70, 0xa0])
            .with_gas(0)
            .with_value(U256::from(1u64));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["data"], "0x70a0");
        assert_eq!(value["value"], "0x1");
        assert!(value.get("gas").is_none());
        assert!(value.get("gasPrice").is_none());
    }
}
