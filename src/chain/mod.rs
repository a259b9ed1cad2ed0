//! Read-only chain introspection over pooled connections.
//!
//! A [`ChainClient`] names one network (id plus endpoint) and resolves its
//! connection from the shared [`ConnectionPool`] on every operation, so a
//! poisoned or invalidated record is transparently redialed on the next call.

mod eth;
mod net;
mod status;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;
use tracing::warn;

pub use status::NetworkStatus;

use crate::config::Config;
use crate::error::{Result, ToolkitError};
use crate::pool::{Connection, ConnectionPool};

/// Typed chain queries for one network.
#[derive(Debug, Clone)]
pub struct ChainClient {
    pool: Arc<ConnectionPool>,
    network_id: String,
    rpc_url: String,
    deadline: Option<Duration>,
}

impl ChainClient {
    pub fn new(pool: Arc<ConnectionPool>, network_id: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            pool,
            network_id: network_id.into(),
            rpc_url: rpc_url.into(),
            deadline: None,
        }
    }

    pub fn from_config(pool: Arc<ConnectionPool>, config: &Config) -> Self {
        Self::new(pool, config.network_id.clone(), config.rpc_url.clone())
    }

    /// Bound every operation by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Resolve (and probe) the pooled connection for this network.
    pub async fn connection(&self) -> Result<Connection> {
        self.pool.resolve(&self.network_id, &self.rpc_url).await
    }

    /// Raw one-shot invocation of `method` on a client without keep-alive.
    pub async fn invoke<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.within(method, async {
            let conn = self.connection().await?;
            conn.rpc().invoke(method, params).await
        })
        .await
    }

    /// Run `fut` under the client's deadline, if one is set.
    pub(crate) async fn within<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let Some(deadline) = self.deadline else {
            return fut.await;
        };
        match timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "{} on network {} exceeded deadline of {:?}",
                    operation, self.network_id, deadline
                );
                Err(ToolkitError::Timeout {
                    operation: operation.to_string(),
                    timeout: deadline,
                })
            }
        }
    }
}
