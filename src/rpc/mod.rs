pub mod client;
pub mod types;

pub use client::{EthClient, RpcClient};
pub use types::{BlockId, CallRequest, SyncProgress};
