//! Contract ABI parsing and the word-packed calling convention.

pub mod codec;
pub mod contract;
pub mod types;
pub mod value;

use sha3::{Digest, Keccak256};

pub use codec::{decode, decode_return, encode, encode_call, ReturnValues};
pub use contract::{AbiEntry, AbiMethod, AbiParam, ContractAbi, Param};
pub use types::AbiType;
pub use value::AbiValue;

/// Keccak-256 digest of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// Hex (no `0x`) of the 4-byte selector for a canonical signature.
pub fn hash_function_selector(signature: &str) -> String {
    hex::encode(contract::compute_selector(signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_function_selector() {
        assert_eq!(hash_function_selector("transfer(address,uint256)"), "a9059cbb");
        assert_eq!(hash_function_selector("symbol()"), "95d89b41");
    }
}
