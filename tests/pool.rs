//! Connection pool behaviour against a mocked JSON-RPC node.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{init_tracing, mock_error, mock_synced, pool};
use evm_toolkit::config::PoolConfig;
use evm_toolkit::{ConnectionPool, ToolkitError};

#[tokio::test]
async fn test_concurrent_resolves_dial_once() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();
    let url = server.uri();

    let (a, b) = tokio::join!(pool.resolve("1", &url), pool.resolve("1", &url));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.client_id(), b.client_id());
    assert_eq!(pool.dial_count(), 1);
}

#[tokio::test]
async fn test_many_tasks_share_one_record() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let url = server.uri();
            tokio::spawn(async move { pool.resolve("net-a", &url).await.map(|c| c.client_id()) })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(pool.dial_count(), 1);
}

#[tokio::test]
async fn test_networks_are_cached_independently() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();

    let a = pool.resolve("1", &server.uri()).await.unwrap();
    let b = pool.resolve("5", &server.uri()).await.unwrap();
    assert_ne!(a.client_id(), b.client_id());
    assert_eq!(a.network_id(), "1");
    assert_eq!(pool.dial_count(), 2);
}

#[tokio::test]
async fn test_probe_failure_forces_redial() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();
    let url = server.uri();

    let first = pool.resolve("1", &url).await.unwrap();

    server.reset().await;
    mock_error(&server, "eth_syncing", -32000, "node is shutting down").await;
    let err = pool.resolve("1", &url).await.unwrap_err();
    assert!(matches!(err, ToolkitError::RpcError { code: -32000, .. }));
    assert!(first.rpc().is_closed());
    assert_eq!(pool.cached_client_id("1").await, None);

    server.reset().await;
    mock_synced(&server).await;
    let second = pool.resolve("1", &url).await.unwrap();
    assert_ne!(first.client_id(), second.client_id());
    assert_eq!(pool.dial_count(), 2);
}

#[tokio::test]
async fn test_probe_timeout_invalidates() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": false }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let pool = ConnectionPool::new(PoolConfig {
        probe_timeout: Duration::from_millis(50),
        request_timeout: Duration::from_secs(5),
    });

    let err = pool.resolve("1", &server.uri()).await.unwrap_err();
    assert!(matches!(err, ToolkitError::Timeout { .. }));
    assert_eq!(pool.cached_client_id("1").await, None);
}

#[tokio::test]
async fn test_invalidate_closes_clients() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();

    let connection = pool.resolve("1", &server.uri()).await.unwrap();
    assert_eq!(pool.cached_client_id("1").await, Some(connection.client_id()));

    pool.invalidate("1").await;
    assert!(connection.rpc().is_closed());
    assert_eq!(pool.cached_client_id("1").await, None);
    assert_eq!(pool.cached_chain_config("1").await, None);

    let fresh = pool.resolve("1", &server.uri()).await.unwrap();
    assert_ne!(fresh.client_id(), connection.client_id());
}

#[tokio::test]
async fn test_evicted_networks_release_their_slots() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    let pool = pool();

    for round in 0..3 {
        for id in 0..8 {
            pool.resolve(&format!("net-{}", id), &server.uri()).await.unwrap();
        }
        assert_eq!(pool.network_count(), 8, "round {}", round);
        for id in 0..8 {
            pool.invalidate(&format!("net-{}", id)).await;
        }
        assert_eq!(pool.network_count(), 0, "round {}", round);
    }

    pool.invalidate("never-seen").await;
    assert_eq!(pool.network_count(), 0);
}

#[tokio::test]
async fn test_dial_failure_is_not_cached() {
    init_tracing();
    let pool = pool();
    let err = pool.resolve("1", "not a url").await.unwrap_err();
    assert!(matches!(err, ToolkitError::DialFailed { .. }));
    assert_eq!(pool.dial_count(), 0);
    assert_eq!(pool.cached_client_id("1").await, None);
    assert_eq!(pool.network_count(), 0);
}

#[tokio::test]
async fn test_chain_config_cached_until_invalidated() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    common::mock_result(&server, "eth_chainId", json!("0x539")).await;
    let pool = pool();

    let connection = pool.resolve("dev", &server.uri()).await.unwrap();
    let cfg = pool.chain_config("dev", &connection).await.unwrap();
    assert_eq!(cfg.chain_id, 1337);
    assert_eq!(cfg.eip155_block, 0);
    assert_eq!(pool.cached_chain_config("dev").await, Some(cfg));

    pool.invalidate("dev").await;
    assert_eq!(pool.cached_chain_config("dev").await, None);
}

#[tokio::test]
async fn test_chain_id_falls_back_to_network_id() {
    init_tracing();
    let server = MockServer::start().await;
    mock_synced(&server).await;
    mock_error(&server, "eth_chainId", -32601, "method not found").await;
    mock_error(&server, "net_version", -32601, "method not found").await;
    let pool = pool();

    let connection = pool.resolve("5", &server.uri()).await.unwrap();
    let cfg = pool.chain_config("5", &connection).await.unwrap();
    assert_eq!(cfg.chain_id, 5);
}
