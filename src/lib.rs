//! EVM JSON-RPC Toolkit
//!
//! This crate talks to Ethereum-family nodes over JSON-RPC. It keeps one
//! pooled client per network, encodes and decodes contract calls against a
//! contract ABI, builds, signs and broadcasts legacy transactions and
//! manages secp256k1 key material including v3 encrypted keystores.
//!
//! # Architecture
//!
//! ```text
//! Caller
//!     |
//!     | ChainClient (network id + endpoint)
//!     v
//! tx builder/signer ---> chain introspection ---> ConnectionPool
//!     |                        |                        |
//!     | abi codec              | abi codec              | RpcClient / EthClient
//!     v                        v                        v
//!                        JSON-RPC node
//! ```
//!
//! # Modules
//!
//! - `config` - Environment configuration and pool/keystore parameters
//! - `error` - The `ToolkitError` type shared by every operation
//! - `rpc` - Low-level JSON-RPC client and typed eth_* wrappers
//! - `pool` - Per-network connection cache with liveness probing
//! - `chain` - Read-only chain introspection and network status
//! - `abi` - ABI parsing and the word-packed calling convention
//! - `tx` - Transaction building, signing and broadcast
//! - `keys` - Keypair generation and v3 keystore encryption

pub mod abi;
pub mod chain;
pub mod config;
pub mod error;
pub mod keys;
pub mod pool;
pub mod rpc;
pub mod tx;

pub use chain::{ChainClient, NetworkStatus};
pub use error::{Result, ToolkitError};
pub use pool::ConnectionPool;
