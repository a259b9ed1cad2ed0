use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Default bound on the pool's liveness probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default bound on a single JSON-RPC round trip.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Toolkit configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Logical network identifier the pool caches connections under
    pub network_id: String,
    /// JSON-RPC endpoint URL (empty when not yet provisioned)
    pub rpc_url: String,
    /// Liveness probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load `.env` (if present) and then the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let network_id = env::var("EVM_NETWORK_ID").unwrap_or_else(|_| "1".to_string());

        let rpc_url = env::var("EVM_RPC_URL").unwrap_or_default();

        let probe_timeout_secs: u64 = env::var("EVM_PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_PROBE_TIMEOUT_SECS.to_string())
            .parse()
            .context("EVM_PROBE_TIMEOUT_SECS must be a valid u64")?;

        let request_timeout_secs: u64 = env::var("EVM_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
            .parse()
            .context("EVM_REQUEST_TIMEOUT_SECS must be a valid u64")?;

        Ok(Config {
            network_id,
            rpc_url,
            probe_timeout_secs,
            request_timeout_secs,
        })
    }

    /// Pool settings derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Timeouts applied by the connection pool and the clients it dials.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// scrypt parameters for encrypted keystore export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystoreParams {
    /// CPU/memory cost; must be a power of two
    pub n: u32,
    pub r: u32,
    pub p: u32,
    pub dklen: usize,
}

impl Default for KeystoreParams {
    fn default() -> Self {
        Self {
            n: 4096,
            r: 4,
            p: 6,
            dklen: 32,
        }
    }
}
