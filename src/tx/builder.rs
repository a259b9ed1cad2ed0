use tracing::{debug, warn};

use super::{TransactionRequest, UnsignedTransaction};
use crate::chain::ChainClient;
use crate::error::{Result, ToolkitError};
use crate::rpc::CallRequest;

impl ChainClient {
    /// Resolve nonce, gas price and gas limit for `request`.
    ///
    /// The pending nonce is used so queued transactions from the same sender
    /// do not collide. A missing or zero gas limit is estimated by the node.
    pub async fn build_transaction(&self, request: &TransactionRequest) -> Result<UnsignedTransaction> {
        self.within("build transaction", async {
            let conn = self.connection().await?;
            let eth = conn.eth();

            let nonce = eth.pending_nonce_at(request.from).await?;
            let gas_price = eth.suggest_gas_price().await?;

            let gas_limit = match request.gas_limit {
                Some(limit) if limit > 0 => limit,
                _ => {
                    if request.to.is_none() {
                        debug!("Attempting to deploy contract via tx; estimating total gas requirements");
                    }
                    let msg = CallRequest::new(request.from, request.to, &request.data)
                        .with_value(request.value)
                        .with_gas_price(gas_price);
                    let estimated = eth.estimate_gas(&msg).await.map_err(|e| {
                        warn!("Failed to estimate gas for tx from {}; {}", request.from, e);
                        ToolkitError::GasEstimationFailed(e.to_string())
                    })?;
                    debug!(
                        "Estimated {} total gas required for tx with {}-byte data payload",
                        estimated,
                        request.data.len()
                    );
                    estimated
                }
            };

            Ok(UnsignedTransaction {
                nonce,
                gas_price,
                gas_limit,
                to: request.to,
                value: request.value,
                data: request.data.clone(),
            })
        })
        .await
    }
}
