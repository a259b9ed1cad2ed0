//! Build, sign and broadcast flow against a mocked JSON-RPC node.

mod common;

use alloy_primitives::{Address, U256};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, init_tracing, mock_error, mock_result, mock_synced, pool, DEV_ADDRESS, DEV_KEY};
use evm_toolkit::tx::signer::recover_sender;
use evm_toolkit::tx::{SignedTransaction, TransactionRequest};
use evm_toolkit::ToolkitError;

fn sender() -> Address {
    DEV_ADDRESS.parse().unwrap()
}

async fn mock_dev_chain(server: &MockServer) {
    mock_synced(server).await;
    mock_result(server, "eth_getTransactionCount", json!("0x7")).await;
    mock_result(server, "eth_gasPrice", json!("0x3b9aca00")).await;
    mock_result(server, "eth_chainId", json!("0x539")).await;
    mock_result(server, "eth_blockNumber", json!("0x10")).await;
}

#[tokio::test]
async fn test_build_estimates_missing_gas_limit() {
    init_tracing();
    let server = MockServer::start().await;
    mock_dev_chain(&server).await;
    mock_result(&server, "eth_estimateGas", json!("0x5208")).await;

    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::call(sender(), Address::repeat_byte(0x35), vec![])
        .with_value(U256::from(1u8));
    let tx = chain.build_transaction(&request).await.unwrap();

    assert_eq!(tx.nonce, 7);
    assert_eq!(tx.gas_price, U256::from(1_000_000_000u64));
    assert_eq!(tx.gas_limit, 21_000);
    assert!(!tx.is_contract_creation());
}

#[tokio::test]
async fn test_build_keeps_explicit_gas_limit() {
    init_tracing();
    let server = MockServer::start().await;
    mock_dev_chain(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_estimateGas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x5208"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::call(sender(), Address::repeat_byte(0x35), vec![])
        .with_gas_limit(90_000);
    let tx = chain.build_transaction(&request).await.unwrap();
    assert_eq!(tx.gas_limit, 90_000);
}

#[tokio::test]
async fn test_gas_estimation_failure_fails_build() {
    init_tracing();
    let server = MockServer::start().await;
    mock_dev_chain(&server).await;
    mock_error(&server, "eth_estimateGas", 3, "execution reverted").await;

    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::deploy(sender(), vec![0x60, 0x80]);
    let err = chain.build_transaction(&request).await.unwrap_err();
    assert!(matches!(err, ToolkitError::GasEstimationFailed(_)));
}

#[tokio::test]
async fn test_sign_tx_uses_chain_replay_protection() {
    init_tracing();
    let server = MockServer::start().await;
    mock_dev_chain(&server).await;
    mock_result(&server, "eth_estimateGas", json!("0x5208")).await;

    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::call(sender(), Address::repeat_byte(0x35), vec![]);
    let signed = chain.sign_tx(&request, DEV_KEY).await.unwrap();

    assert_eq!(signed.chain_id(), Some(1337));
    assert_eq!(recover_sender(&signed).unwrap(), sender());

    let decoded = SignedTransaction::decode(signed.raw()).unwrap();
    assert_eq!(decoded.hash(), signed.hash());
    assert_eq!(decoded.transaction().nonce, 7);
}

#[tokio::test]
async fn test_sign_tx_rejects_bad_key_before_network() {
    init_tracing();
    let server = MockServer::start().await;
    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::call(sender(), Address::repeat_byte(0x35), vec![]);

    let err = chain.sign_tx(&request, "0xnot-a-key").await.unwrap_err();
    assert!(matches!(err, ToolkitError::SigningFailed(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_send_transaction_broadcasts_raw_bytes() {
    init_tracing();
    let server = MockServer::start().await;
    mock_dev_chain(&server).await;
    mock_result(&server, "eth_estimateGas", json!("0x5208")).await;

    let chain = client(&pool(), "dev", &server);
    let request = TransactionRequest::call(sender(), Address::repeat_byte(0x35), vec![]);
    let signed = chain.sign_tx(&request, DEV_KEY).await.unwrap();

    let raw = format!("0x{}", hex::encode(signed.raw()));
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction", "params": [raw] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": signed.hash()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hash = chain.broadcast(&signed).await.unwrap();
    assert_eq!(hash, signed.hash());
}
