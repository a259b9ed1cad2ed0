use alloy_primitives::B256;
use tracing::{info, warn};

use super::{SignedTransaction, TransactionRequest};
use crate::chain::ChainClient;
use crate::error::Result;

impl ChainClient {
    /// Submit a signed transaction to the node's pending pool.
    pub async fn broadcast(&self, tx: &SignedTransaction) -> Result<B256> {
        self.within("eth_sendRawTransaction", async {
            let conn = self.connection().await?;
            let hash = conn
                .eth()
                .send_raw_transaction(tx.raw())
                .await
                .map_err(|e| {
                    warn!("Failed to transmit signed tx {} to JSON-RPC host; {}", tx.hash(), e);
                    e
                })?;
            if hash != tx.hash() {
                warn!("Node reported hash {} for tx {}", hash, tx.hash());
            }
            info!("Broadcast tx {} on network {}", hash, self.network_id());
            Ok(hash)
        })
        .await
    }

    /// Build, sign and broadcast.
    pub async fn send_transaction(&self, request: &TransactionRequest, private_key: &str) -> Result<B256> {
        let signed = self.sign_tx(request, private_key).await?;
        self.broadcast(&signed).await
    }
}
