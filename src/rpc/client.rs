use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::types::*;
use crate::error::{Result, ToolkitError};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Low-level JSON-RPC client: raw method invocation against one endpoint.
///
/// `request` runs over a persistent keep-alive session that lives until the
/// owning connection record is invalidated; `invoke` is a stateless one-shot
/// call on a fresh HTTP client with connection reuse disabled.
#[derive(Debug)]
pub struct RpcClient {
    id: u64,
    url: Url,
    session: Client,
    request_timeout: Duration,
    next_request_id: AtomicU64,
    closed: AtomicBool,
}

impl RpcClient {
    /// Dial a JSON-RPC endpoint.
    pub fn dial(rpc_url: &str, request_timeout: Duration) -> Result<Self> {
        let dial_err = |reason: String| ToolkitError::DialFailed {
            url: rpc_url.to_string(),
            reason,
        };

        let url = Url::parse(rpc_url).map_err(|e| dial_err(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(dial_err(format!("unsupported scheme {}", url.scheme())));
        }

        let session = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| dial_err(e.to_string()))?;

        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Dialed JSON-RPC host @ {} (client {})", url, id);

        Ok(Self {
            id,
            url,
            session,
            request_timeout,
            next_request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Process-unique identity of this client.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mark the client closed; every later call fails without touching the network.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed JSON-RPC client {} for {}", self.id, self.url);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Call `method` over the persistent session.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.send(&self.session, method, params).await?;
        serde_json::from_value(result).map_err(|e| ToolkitError::invalid_response(method, e))
    }

    /// Call `method` on a one-shot HTTP client without keep-alive.
    pub async fn invoke<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let one_shot = Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ToolkitError::rpc(method, e))?;
        let result = self.send(&one_shot, method, params).await?;
        serde_json::from_value(result).map_err(|e| ToolkitError::invalid_response(method, e))
    }

    async fn send(&self, http: &Client, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(ToolkitError::rpc(method, format!("client {} is closed", self.id)));
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to invoke JSON-RPC method: {}; {}", method, e);
                ToolkitError::rpc(method, e)
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ToolkitError::rpc(method, e))?;

        if !status.is_success() {
            error!(
                "JSON-RPC host returned HTTP {} for {}: {}",
                status,
                method,
                String::from_utf8_lossy(&body)
            );
            return Err(ToolkitError::rpc(method, format!("HTTP {}", status)));
        }

        let rpc_response: JsonRpcResponse = serde_json::from_slice(&body).map_err(|e| {
            ToolkitError::rpc(
                method,
                format!(
                    "failed to unmarshal response {}: {}",
                    String::from_utf8_lossy(&body),
                    e
                ),
            )
        })?;

        if let Some(err) = rpc_response.error {
            warn!("JSON-RPC error: method={}, code={}, message={}", method, err.code, err.message);
            return Err(ToolkitError::RpcError {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        debug!(
            "Invocation of JSON-RPC method {} succeeded ({}-byte response)",
            method,
            body.len()
        );
        Ok(rpc_response.result.unwrap_or(Value::Null))
    }
}

/// High-level client exposing typed chain operations over an [`RpcClient`].
#[derive(Debug, Clone)]
pub struct EthClient {
    rpc: Arc<RpcClient>,
}

impl EthClient {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    pub fn close(&self) {
        self.rpc.close();
    }

    /// `None` when the node reports itself fully synced.
    pub async fn sync_progress(&self) -> Result<Option<SyncProgress>> {
        let result: Value = self.rpc.request("eth_syncing", json!([])).await?;
        let progress = SyncProgress::from_result(result)?;
        if let Some(p) = &progress {
            debug!(
                "Latest synced block reported by client {}: {} [of {}]",
                self.rpc.id(),
                p.current_block,
                p.highest_block
            );
        }
        Ok(progress)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let hex: String = self.rpc.request("eth_chainId", json!([])).await?;
        parse_quantity("eth_chainId", &hex)
    }

    pub async fn block_number(&self) -> Result<u64> {
        let hex: String = self.rpc.request("eth_blockNumber", json!([])).await?;
        parse_quantity("eth_blockNumber", &hex)
    }

    /// Network id as reported by `net_version` (decimal string).
    pub async fn network_version(&self) -> Result<String> {
        self.rpc.request("net_version", json!([])).await
    }

    pub async fn pending_nonce_at(&self, account: Address) -> Result<u64> {
        let hex: String = self
            .rpc
            .request("eth_getTransactionCount", json!([account, "pending"]))
            .await?;
        parse_quantity("eth_getTransactionCount", &hex)
    }

    pub async fn suggest_gas_price(&self) -> Result<U256> {
        self.rpc.request("eth_gasPrice", json!([])).await
    }

    pub async fn estimate_gas(&self, msg: &CallRequest) -> Result<u64> {
        let hex: String = self.rpc.request("eth_estimateGas", json!([msg])).await?;
        parse_quantity("eth_estimateGas", &hex)
    }

    pub async fn call_contract(&self, msg: &CallRequest, block: BlockId) -> Result<Vec<u8>> {
        let hex: String = self
            .rpc
            .request("eth_call", json!([msg, block.to_param()]))
            .await?;
        parse_data("eth_call", &hex)
    }

    pub async fn balance_at(&self, account: Address, block: BlockId) -> Result<U256> {
        self.rpc
            .request("eth_getBalance", json!([account, block.to_param()]))
            .await
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        self.rpc
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Value>> {
        self.rpc
            .request("eth_getTransactionReceipt", json!([hash]))
            .await
    }
}
