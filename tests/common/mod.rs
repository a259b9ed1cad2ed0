//! Shared helpers for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use evm_toolkit::config::PoolConfig;
use evm_toolkit::{ChainClient, ConnectionPool};

pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Install a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rpc_method(name: &str) -> wiremock::MockBuilder {
    Mock::given(method("POST")).and(body_partial_json(json!({ "method": name })))
}

/// Answer `name` with a JSON-RPC result.
pub async fn mock_result(server: &MockServer, name: &str, result: Value) {
    rpc_method(name)
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })),
        )
        .mount(server)
        .await;
}

/// Answer `name` with a JSON-RPC error object.
pub async fn mock_error(server: &MockServer, name: &str, code: i64, message: &str) {
    rpc_method(name)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": message }
        })))
        .mount(server)
        .await;
}

/// A synced node: `eth_syncing` answers `false`.
pub async fn mock_synced(server: &MockServer) {
    mock_result(server, "eth_syncing", json!(false)).await;
}

pub fn client(pool: &Arc<ConnectionPool>, network_id: &str, server: &MockServer) -> ChainClient {
    ChainClient::new(pool.clone(), network_id, server.uri())
}

pub fn pool() -> Arc<ConnectionPool> {
    Arc::new(ConnectionPool::new(PoolConfig::default()))
}

pub fn word(hex_value: &str) -> String {
    format!("0x{:0>64}", hex_value)
}
