use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by every toolkit operation.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// The JSON-RPC endpoint could not be dialed.
    #[error("Failed to dial JSON-RPC host {url}: {reason}")]
    DialFailed { url: String, reason: String },

    /// Transport failure or unreadable response from a JSON-RPC call.
    #[error("JSON-RPC invocation of {method} failed: {reason}")]
    RpcInvocationFailed { method: String, reason: String },

    /// The node answered with a JSON-RPC error object.
    #[error("JSON-RPC {method} returned error {code}: {message}")]
    RpcError {
        method: String,
        code: i64,
        message: String,
    },

    /// The node answered, but the result was not in the expected shape.
    #[error("Unexpected {method} response: {reason}")]
    InvalidResponse { method: String, reason: String },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    #[error("Method {0} not found in ABI")]
    MethodNotFound(String),

    #[error("ABI encoding failed: {0}")]
    AbiEncodingFailed(String),

    #[error("ABI decoding failed: {0}")]
    AbiDecodingFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Keystore decryption failed: {0}")]
    KeystoreDecryptionFailed(String),
}

impl ToolkitError {
    pub(crate) fn rpc(method: &str, reason: impl ToString) -> Self {
        ToolkitError::RpcInvocationFailed {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_response(method: &str, reason: impl ToString) -> Self {
        ToolkitError::InvalidResponse {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures caused by an unreachable or misbehaving node rather
    /// than by the caller's input.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ToolkitError::DialFailed { .. }
                | ToolkitError::RpcInvocationFailed { .. }
                | ToolkitError::RpcError { .. }
                | ToolkitError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        let dial = ToolkitError::DialFailed {
            url: "http://localhost:8545".to_string(),
            reason: "refused".to_string(),
        };
        assert!(dial.is_connectivity());
        assert!(ToolkitError::rpc("eth_syncing", "reset").is_connectivity());
        assert!(!ToolkitError::AbiDecodingFailed("short".to_string()).is_connectivity());
        assert!(!ToolkitError::invalid_response("eth_blockNumber", "not hex").is_connectivity());
    }

    #[test]
    fn test_error_messages() {
        let err = ToolkitError::RpcError {
            method: "eth_call".to_string(),
            code: -32000,
            message: "execution reverted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "JSON-RPC eth_call returned error -32000: execution reverted"
        );
    }
}
