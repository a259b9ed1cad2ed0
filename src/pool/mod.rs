//! Per-network cache of dialed JSON-RPC clients.
//!
//! Every network id maps to at most one [`Connection`] plus its resolved
//! [`ChainConfig`]. The outer map lock is only held to find or create the
//! per-network slot; the slot's async lock makes see-if-cached, dial and
//! insert atomic for that id while other ids proceed in parallel. Liveness
//! probes run outside both locks.

pub mod chain_config;
pub mod connection;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use chain_config::ChainConfig;
pub use connection::Connection;

use crate::config::PoolConfig;
use crate::error::{Result, ToolkitError};
use crate::rpc::RpcClient;

#[derive(Debug, Default)]
struct NetworkEntry {
    connection: Option<Connection>,
    chain_config: Option<ChainConfig>,
}

/// Registry of live connections keyed by network id.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    networks: Mutex<HashMap<String, Arc<AsyncMutex<NetworkEntry>>>>,
    config: PoolConfig,
    dials: AtomicU64,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            networks: Mutex::new(HashMap::new()),
            config,
            dials: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of dials performed over the pool's lifetime.
    pub fn dial_count(&self) -> u64 {
        self.dials.load(Ordering::SeqCst)
    }

    /// Number of network slots currently held.
    pub fn network_count(&self) -> usize {
        self.networks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn entry(&self, network_id: &str) -> Arc<AsyncMutex<NetworkEntry>> {
        let mut networks = self.networks.lock().unwrap_or_else(|e| e.into_inner());
        networks.entry(network_id.to_string()).or_default().clone()
    }

    fn existing_entry(&self, network_id: &str) -> Option<Arc<AsyncMutex<NetworkEntry>>> {
        let networks = self.networks.lock().unwrap_or_else(|e| e.into_inner());
        networks.get(network_id).cloned()
    }

    /// Resolve the cached connection for `network_id`, dialing `rpc_url` when
    /// none exists, then probe it. A failed probe poisons the network's cache.
    pub async fn resolve(&self, network_id: &str, rpc_url: &str) -> Result<Connection> {
        let connection = self.dial_or_reuse(network_id, rpc_url).await?;

        match timeout(self.config.probe_timeout, connection.eth().sync_progress()).await {
            Ok(Ok(_)) => Ok(connection),
            Ok(Err(e)) => {
                warn!(
                    "Failed to read sync progress for client {} on network {}; {}",
                    connection.client_id(),
                    network_id,
                    e
                );
                self.evict(network_id, Some(connection.client_id())).await;
                Err(e)
            }
            Err(_) => {
                warn!(
                    "Liveness probe for client {} on network {} timed out after {:?}",
                    connection.client_id(),
                    network_id,
                    self.config.probe_timeout
                );
                self.evict(network_id, Some(connection.client_id())).await;
                Err(ToolkitError::Timeout {
                    operation: format!("eth_syncing probe for network {}", network_id),
                    timeout: self.config.probe_timeout,
                })
            }
        }
    }

    async fn dial_or_reuse(&self, network_id: &str, rpc_url: &str) -> Result<Connection> {
        let slot = self.entry(network_id);
        let mut entry = slot.lock().await;

        if let Some(connection) = &entry.connection {
            debug!(
                "Resolved cached client {} for network {}",
                connection.client_id(),
                network_id
            );
            return Ok(connection.clone());
        }

        let rpc = match RpcClient::dial(rpc_url, self.config.request_timeout) {
            Ok(rpc) => rpc,
            Err(e) => {
                warn!("Failed to dial JSON-RPC host: {}; {}", rpc_url, e);
                drop(entry);
                self.prune(network_id, &slot);
                return Err(e);
            }
        };
        self.dials.fetch_add(1, Ordering::SeqCst);

        let connection = Connection::new(network_id, rpc);
        info!(
            "Cached client {} for network {} @ {}",
            connection.client_id(),
            network_id,
            rpc_url
        );
        entry.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Close and forget everything cached for `network_id`.
    pub async fn invalidate(&self, network_id: &str) {
        self.evict(network_id, None).await;
    }

    /// Evict the network's cache. With `only_client`, a record dialed after
    /// the failing one is left alone.
    async fn evict(&self, network_id: &str, only_client: Option<u64>) {
        let Some(slot) = self.existing_entry(network_id) else {
            return;
        };
        let mut entry = slot.lock().await;

        if let (Some(expected), Some(current)) = (only_client, &entry.connection) {
            if current.client_id() != expected {
                debug!(
                    "Client {} for network {} already replaced by {}; not evicting",
                    expected,
                    network_id,
                    current.client_id()
                );
                return;
            }
        }

        if let Some(connection) = entry.connection.take() {
            connection.close();
        }
        entry.chain_config = None;
        drop(entry);
        info!("Cleared cached JSON-RPC clients for network {}", network_id);
        self.prune(network_id, &slot);
    }

    /// Drop an empty slot from the map unless another task holds it.
    fn prune(&self, network_id: &str, slot: &Arc<AsyncMutex<NetworkEntry>>) {
        let mut networks = self.networks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(current) = networks.get(network_id) else {
            return;
        };
        // One reference in the map, one held by the caller.
        if !Arc::ptr_eq(current, slot) || Arc::strong_count(slot) > 2 {
            return;
        }
        let vacant = slot
            .try_lock()
            .map(|entry| entry.connection.is_none() && entry.chain_config.is_none())
            .unwrap_or(false);
        if vacant {
            networks.remove(network_id);
        }
    }

    /// Id of the currently cached low-level client, if any.
    pub async fn cached_client_id(&self, network_id: &str) -> Option<u64> {
        let entry = self.existing_entry(network_id)?;
        let entry = entry.lock().await;
        entry.connection.as_ref().map(Connection::client_id)
    }

    pub async fn cached_chain_config(&self, network_id: &str) -> Option<ChainConfig> {
        let entry = self.existing_entry(network_id)?;
        let entry = entry.lock().await;
        entry.chain_config
    }

    /// Chain configuration for the network, resolved through `connection` on
    /// first use and cached until the network is invalidated.
    pub async fn chain_config(&self, network_id: &str, connection: &Connection) -> Result<ChainConfig> {
        let Some(entry) = self.existing_entry(network_id) else {
            return fetch_chain_id(network_id, connection).await.map(ChainConfig::for_chain_id);
        };
        if let Some(cfg) = entry.lock().await.chain_config {
            return Ok(cfg);
        }

        let chain_id = fetch_chain_id(network_id, connection).await?;
        let cfg = ChainConfig::for_chain_id(chain_id);

        let mut guard = entry.lock().await;
        let still_current = guard
            .connection
            .as_ref()
            .is_some_and(|c| c.client_id() == connection.client_id());
        if still_current {
            debug!("Cached chain config for network {}: {:?}", network_id, cfg);
            guard.chain_config = Some(cfg);
        }
        Ok(cfg)
    }
}

/// `eth_chainId`, then `net_version`, then the network id itself when it is numeric.
async fn fetch_chain_id(network_id: &str, connection: &Connection) -> Result<u64> {
    let primary = match connection.eth().chain_id().await {
        Ok(id) => return Ok(id),
        Err(e) => e,
    };
    debug!("eth_chainId unavailable for network {}; {}", network_id, primary);

    if let Ok(version) = connection.eth().network_version().await {
        if let Ok(id) = version.trim().parse::<u64>() {
            return Ok(id);
        }
    }

    network_id.parse::<u64>().map_err(|_| {
        warn!("Failed to resolve chain id for network {}", network_id);
        primary
    })
}
