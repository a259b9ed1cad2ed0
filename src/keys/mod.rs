//! secp256k1 key material: generation, addresses and v3 keystores.

pub mod keystore;

use std::fmt;

use alloy_primitives::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;

pub use keystore::{
    decrypt_keystore, export_encrypted_keystore, export_keypair_json, KeypairRecord, KeystoreRecord,
};

use crate::abi::keccak256;
use crate::error::{Result, ToolkitError};

/// A secp256k1 private key. `Debug` never prints the scalar.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Parse a 32-byte key from hex, with or without `0x`.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let trimmed = hex_key.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| ToolkitError::SigningFailed(format!("private key is not valid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ToolkitError::SigningFailed(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|e| ToolkitError::SigningFailed(format!("invalid private key: {}", e)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn address(&self) -> Address {
        pubkey_to_address(self.0.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({} <redacted>)", self.address())
    }
}

/// Generate a fresh keypair from OS randomness.
pub fn generate_keypair() -> (Address, PrivateKey) {
    let key = PrivateKey(SigningKey::random(&mut OsRng));
    let address = key.address();
    debug!("Generated keypair for address {}", address);
    (address, key)
}

/// Last 20 bytes of keccak256 over the uncompressed public key (tag byte dropped).
pub fn pubkey_to_address(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
