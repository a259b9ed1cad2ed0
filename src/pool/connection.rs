use std::sync::Arc;

use crate::rpc::{EthClient, RpcClient};

/// The live client pair cached for one network id.
#[derive(Debug, Clone)]
pub struct Connection {
    network_id: Arc<str>,
    rpc: Arc<RpcClient>,
    eth: EthClient,
}

impl Connection {
    pub(crate) fn new(network_id: &str, rpc: RpcClient) -> Self {
        let rpc = Arc::new(rpc);
        Self {
            network_id: Arc::from(network_id),
            eth: EthClient::new(rpc.clone()),
            rpc,
        }
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Low-level client for raw method invocation.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// High-level client for typed chain operations.
    pub fn eth(&self) -> &EthClient {
        &self.eth
    }

    /// Identity of the dialed low-level client.
    pub fn client_id(&self) -> u64 {
        self.rpc.id()
    }

    pub(crate) fn close(&self) {
        self.eth.close();
        self.rpc.close();
    }
}
