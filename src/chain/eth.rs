use alloy_primitives::{Address, B256, U256};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ChainClient;
use crate::abi::{decode_return, encode_call, AbiValue, ContractAbi, ReturnValues};
use crate::error::{Result, ToolkitError};
use crate::rpc::types::parse_data;
use crate::rpc::{BlockId, CallRequest};

impl ChainClient {
    /// Number of the most recent block.
    pub async fn latest_block_number(&self) -> Result<u64> {
        self.within("eth_blockNumber", async {
            let conn = self.connection().await?;
            let number = conn.eth().block_number().await?;
            debug!("eth_blockNumber on network {} -> {}", self.network_id, number);
            Ok(number)
        })
        .await
    }

    /// Block with full transaction objects; `Value::Null` when unknown.
    pub async fn block_by_number(&self, number: u64) -> Result<Value> {
        self.fetch_block(BlockId::Number(number)).await
    }

    pub async fn latest_block(&self) -> Result<Value> {
        self.fetch_block(BlockId::Latest).await
    }

    async fn fetch_block(&self, block: BlockId) -> Result<Value> {
        self.within("eth_getBlockByNumber", async {
            let conn = self.connection().await?;
            conn.rpc()
                .invoke("eth_getBlockByNumber", json!([block.to_param(), true]))
                .await
        })
        .await
    }

    pub async fn header_by_number(&self, number: u64) -> Result<Value> {
        self.within("eth_getHeaderByNumber", async {
            let conn = self.connection().await?;
            conn.rpc()
                .invoke(
                    "eth_getHeaderByNumber",
                    json!([BlockId::Number(number).to_param()]),
                )
                .await
        })
        .await
    }

    /// Node-suggested gas price in wei.
    pub async fn gas_price(&self) -> Result<U256> {
        self.within("eth_gasPrice", async {
            let conn = self.connection().await?;
            conn.eth().suggest_gas_price().await
        })
        .await
    }

    /// Code deployed at `address` in the given scope; empty for accounts.
    pub async fn code(&self, address: Address, block: BlockId) -> Result<Vec<u8>> {
        self.within("eth_getCode", async {
            let conn = self.connection().await?;
            debug!("Attempting to fetch code from {} via eth_getCode", address);
            let hex: String = conn
                .rpc()
                .invoke("eth_getCode", json!([address, block.to_param()]))
                .await
                .map_err(|e| {
                    warn!("Failed to invoke eth_getCode; {}", e);
                    e
                })?;
            parse_data("eth_getCode", &hex)
        })
        .await
    }

    /// Native currency balance in wei at the latest block.
    pub async fn native_balance(&self, address: Address) -> Result<U256> {
        self.within("eth_getBalance", async {
            let conn = self.connection().await?;
            conn.eth().balance_at(address, BlockId::Latest).await
        })
        .await
    }

    /// `balanceOf(holder)` on a token contract.
    pub async fn token_balance(&self, token: Address, holder: Address, abi_json: &str) -> Result<U256> {
        let abi = ContractAbi::from_json(abi_json)?;
        let method = abi.method("balanceOf")?;
        let calldata = encode_call(method, &[json!(holder.to_string())])?;

        let balance = self
            .within("balanceOf", async {
                let conn = self.connection().await?;
                let gas_price = conn.eth().suggest_gas_price().await?;
                let msg = CallRequest::new(holder, Some(token), &calldata).with_gas_price(gas_price);
                let result = conn.eth().call_contract(&msg, BlockId::Latest).await?;
                decode_uint(decode_return(method, &result)?)
            })
            .await?;

        if abi.method("symbol").is_ok() {
            if let Ok(Some(symbol)) = self.token_symbol(holder, token, abi_json).await {
                debug!("Read {} token balance ({}) for {}", symbol, balance, holder);
            }
        }
        Ok(balance)
    }

    /// `symbol()` on a token contract; `None` when the ABI has no such method.
    pub async fn token_symbol(&self, from: Address, token: Address, abi_json: &str) -> Result<Option<String>> {
        let abi = ContractAbi::from_json(abi_json)?;
        let Ok(method) = abi.method("symbol") else {
            return Ok(None);
        };
        let calldata = encode_call(method, &[])?;

        self.within("symbol", async {
            let conn = self.connection().await?;
            let msg = CallRequest::new(from, Some(token), &calldata).with_gas_price(U256::ZERO);
            let result = conn.eth().call_contract(&msg, BlockId::Latest).await?;
            match decode_return(method, &result) {
                Ok(ReturnValues::Single(AbiValue::String(symbol))) => Ok(Some(symbol)),
                Ok(other) => Err(ToolkitError::AbiDecodingFailed(format!(
                    "unexpected symbol() return {:?}",
                    other
                ))),
                Err(e) => {
                    warn!("Failed to read token symbol from contract {}; {}", token, e);
                    Err(e)
                }
            }
        })
        .await
    }

    /// Read a constant method through `eth_call` and decode its outputs.
    pub async fn read_contract(
        &self,
        from: Address,
        to: Address,
        value: Option<U256>,
        method: &str,
        abi_json: &str,
        params: &[Value],
    ) -> Result<ReturnValues> {
        let abi = ContractAbi::from_json(abi_json)?;
        let abi_method = abi.method(method)?;
        if !abi_method.is_constant() {
            return Err(ToolkitError::InvalidAbi(format!(
                "{} is not a constant method; it must be sent as a transaction",
                abi_method.signature()
            )));
        }
        let calldata = encode_call(abi_method, params)?;
        debug!(
            "Attempting to read constant method {} on contract {} ({} params)",
            method,
            to,
            params.len()
        );

        self.within("eth_call", async {
            let conn = self.connection().await?;
            let gas_price = conn.eth().suggest_gas_price().await?;
            let mut msg = CallRequest::new(from, Some(to), &calldata).with_gas_price(gas_price);
            if let Some(value) = value {
                msg = msg.with_value(value);
            }
            let result = conn.eth().call_contract(&msg, BlockId::Latest).await?;
            decode_return(abi_method, &result).map_err(|e| {
                warn!(
                    "Failed to read constant {} on contract {} (calldata 0x{}); {}",
                    method,
                    to,
                    hex::encode(&calldata),
                    e
                );
                e
            })
        })
        .await
    }

    /// Receipt of a mined transaction; `None` while it is still pending.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Value>> {
        self.within("eth_getTransactionReceipt", async {
            let conn = self.connection().await?;
            debug!("Attempting to retrieve tx receipt for broadcast tx: {}", hash);
            conn.eth().transaction_receipt(hash).await
        })
        .await
    }

    /// VM traces for a transaction. Requires a tracing-enabled archive node.
    pub async fn trace_transaction(&self, hash: &str) -> Result<Value> {
        let hash = if hash.starts_with("0x") {
            hash.to_string()
        } else {
            format!("0x{}", hash)
        };
        self.within("trace_transaction", async {
            let conn = self.connection().await?;
            debug!("Attempting to trace tx via trace_transaction; tx hash: {}", hash);
            conn.rpc()
                .invoke("trace_transaction", json!([hash]))
                .await
                .map_err(|e| {
                    warn!("Failed to invoke trace_transaction; {}", e);
                    e
                })
        })
        .await
    }
}

fn decode_uint(values: ReturnValues) -> Result<U256> {
    values
        .single()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| ToolkitError::AbiDecodingFailed(format!("expected a single uint, got {:?}", values)))
}
