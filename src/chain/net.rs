use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ChainClient;
use crate::error::Result;
use crate::pool::ChainConfig;
use crate::rpc::types::parse_quantity;
use crate::rpc::SyncProgress;

impl ChainClient {
    /// Chain id from `eth_chainId`, falling back to `net_version`.
    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_config().await.map(|cfg| cfg.chain_id)
    }

    /// Chain configuration, cached in the pool once resolved.
    pub async fn chain_config(&self) -> Result<ChainConfig> {
        self.within("chain config", async {
            let conn = self.connection().await?;
            self.pool.chain_config(&self.network_id, &conn).await
        })
        .await
    }

    /// Connected peers via `net_peerCount`, then `parity_netPeers`; zero
    /// when the node supports neither.
    pub async fn peer_count(&self) -> Result<u64> {
        self.within("peer count", async {
            let conn = self.connection().await?;

            debug!("Attempting to fetch peer count via net_peerCount");
            match conn.rpc().invoke::<String>("net_peerCount", json!([])).await {
                Ok(hex) => return Ok(parse_quantity("net_peerCount", &hex).unwrap_or(0)),
                Err(e) => debug!("net_peerCount unavailable; {}", e),
            }

            debug!("Attempting to fetch peer count via parity_netPeers");
            match conn.rpc().invoke::<Value>("parity_netPeers", json!([])).await {
                Ok(peers) => Ok(peers.get("connected").and_then(Value::as_u64).unwrap_or(0)),
                Err(e) => {
                    warn!("Failed to invoke parity_netPeers; {}", e);
                    Ok(0)
                }
            }
        })
        .await
    }

    /// Protocol version via `eth_protocolVersion`, then `net_version`.
    pub async fn protocol_version(&self) -> Result<Option<String>> {
        self.within("protocol version", async {
            let conn = self.connection().await?;

            debug!("Attempting to fetch protocol version via eth_protocolVersion");
            match conn.rpc().invoke::<String>("eth_protocolVersion", json!([])).await {
                Ok(version) => return Ok(Some(version)),
                Err(e) => debug!("eth_protocolVersion unavailable; {}", e),
            }

            debug!("Attempting to fetch protocol version via net_version");
            match conn.rpc().invoke::<String>("net_version", json!([])).await {
                Ok(version) => Ok(Some(version)),
                Err(e) => {
                    warn!("Failed to invoke eth_protocolVersion or net_version; {}", e);
                    Ok(None)
                }
            }
        })
        .await
    }

    /// `None` when the node is synced.
    pub async fn sync_progress(&self) -> Result<Option<SyncProgress>> {
        self.within("eth_syncing", async {
            let conn = self.connection().await?;
            conn.eth().sync_progress().await
        })
        .await
    }
}
