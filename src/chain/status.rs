use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::ChainClient;
use crate::error::{Result, ToolkitError};
use crate::rpc::types::parse_quantity;

pub const STATE_CONFIGURING: &str = "configuring";
pub const STATE_SYNCED: &str = "synced";
pub const STATE_SYNCING: &str = "syncing";

/// Snapshot of a node's chain state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Current block; below `height` while syncing
    #[serde(default, skip_serializing_if = "is_zero")]
    pub block: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Highest known block; only reported while syncing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Unix timestamp of the last block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_block_at: Option<u64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub peer_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub syncing: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl NetworkStatus {
    /// Status for a node that cannot be reached or is not configured yet.
    pub fn configuring(reason: impl Into<String>) -> Self {
        let mut meta = Map::new();
        meta.insert("error".to_string(), Value::String(reason.into()));
        Self {
            state: Some(STATE_CONFIGURING.to_string()),
            meta,
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.state.as_deref() == Some(STATE_CONFIGURING)
    }
}

impl ChainClient {
    /// Block height, chain id, peers, protocol version and sync state.
    ///
    /// Connectivity failures produce a degraded `configuring` status instead
    /// of an error; malformed node responses are still errors.
    pub async fn network_status(&self) -> Result<NetworkStatus> {
        if self.rpc_url.is_empty() {
            return Ok(NetworkStatus::configuring(
                "No full-node JSON-RPC URL configured or resolvable",
            ));
        }

        match self.collect_status().await {
            Err(e) if e.is_connectivity() => {
                warn!(
                    "Failed to read network status from JSON-RPC host {}; {}",
                    self.rpc_url, e
                );
                self.pool.invalidate(&self.network_id).await;
                Ok(NetworkStatus::configuring(e.to_string()))
            }
            other => other,
        }
    }

    async fn collect_status(&self) -> Result<NetworkStatus> {
        let progress = self.sync_progress().await?;

        let chain_id = match self.chain_id().await {
            Ok(id) => Some(format!("0x{:x}", id)),
            Err(e) => {
                warn!("Failed to resolve chain id for network {}; {}", self.network_id, e);
                None
            }
        };
        let peer_count = self.peer_count().await?;
        let protocol_version = self.protocol_version().await?;

        let mut status = NetworkStatus {
            chain_id,
            peer_count,
            protocol_version,
            ..Default::default()
        };

        match progress {
            Some(progress) => {
                status.state = Some(STATE_SYNCING.to_string());
                status.syncing = true;
                status.block = progress.current_block;
                status.height = Some(progress.highest_block);
            }
            None => {
                let mut header = match self.latest_block().await? {
                    Value::Object(header) => header,
                    other => {
                        return Err(ToolkitError::invalid_response(
                            "eth_getBlockByNumber",
                            format!("expected a block object, got {}", other),
                        ))
                    }
                };
                header.remove("transactions");
                header.remove("uncles");

                status.state = Some(STATE_SYNCED.to_string());
                status.block = header_quantity(&header, "number")?;
                status.last_block_at = Some(header_quantity(&header, "timestamp")?);
                status
                    .meta
                    .insert("last_block_header".to_string(), Value::Object(header));
            }
        }

        Ok(status)
    }
}

fn header_quantity(header: &Map<String, Value>, field: &str) -> Result<u64> {
    let hex = header.get(field).and_then(Value::as_str).ok_or_else(|| {
        ToolkitError::invalid_response("eth_getBlockByNumber", format!("block has no {}", field))
    })?;
    parse_quantity("eth_getBlockByNumber", hex)
}
