//! Transaction construction, signing and broadcast.
//!
//! A transaction moves one way through `TransactionRequest` →
//! [`UnsignedTransaction`] → [`SignedTransaction`] → broadcast. Signing
//! consumes the unsigned value; the signed value exposes no mutators.

pub mod broadcast;
pub mod builder;
pub mod signer;

use alloy_primitives::{Address, B256, U256};
use rlp::{Rlp, RlpStream};

pub use signer::Signer;

use crate::abi::keccak256;
use crate::error::{Result, ToolkitError};

/// What the caller wants sent; nonce and gas price are resolved from the node.
#[derive(Debug, Clone, Default)]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` deploys `data` as contract code
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// Explicit gas limit; `None` or zero asks the node to estimate
    pub gas_limit: Option<u64>,
}

impl TransactionRequest {
    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn deploy(from: Address, code: Vec<u8>) -> Self {
        Self {
            from,
            to: None,
            data: code,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// A fully-specified legacy transaction awaiting a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Append the six payload fields shared by every encoding.
    pub(crate) fn rlp_append_fields(&self, s: &mut RlpStream) {
        s.append(&self.nonce);
        s.append(&u256_bytes(self.gas_price));
        s.append(&self.gas_limit);
        match self.to {
            Some(to) => s.append(&to.to_vec()),
            None => s.append_empty_data(),
        };
        s.append(&u256_bytes(self.value));
        s.append(&self.data);
    }
}

/// A signed transaction, identified by the keccak256 of its RLP encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    v: u64,
    r: U256,
    s: U256,
    hash: B256,
    raw: Vec<u8>,
}

impl SignedTransaction {
    pub(crate) fn new(tx: UnsignedTransaction, v: u64, r: U256, s: U256) -> Self {
        let mut stream = RlpStream::new_list(9);
        tx.rlp_append_fields(&mut stream);
        stream.append(&v);
        stream.append(&u256_bytes(r));
        stream.append(&u256_bytes(s));
        let raw = stream.out().to_vec();
        let hash = B256::from(keccak256(&raw));
        Self { tx, v, r, s, hash, raw }
    }

    /// Decode a signed legacy transaction from its RLP bytes.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let rlp = Rlp::new(raw);
        let malformed = |e: rlp::DecoderError| {
            ToolkitError::SigningFailed(format!("malformed signed transaction: {}", e))
        };

        if !rlp.is_list() || rlp.item_count().map_err(malformed)? != 9 {
            return Err(ToolkitError::SigningFailed(
                "signed transaction must be a 9-item RLP list".to_string(),
            ));
        }

        let to_bytes: Vec<u8> = rlp.val_at(3).map_err(malformed)?;
        let to = match to_bytes.len() {
            0 => None,
            20 => Some(Address::from_slice(&to_bytes)),
            n => {
                return Err(ToolkitError::SigningFailed(format!(
                    "recipient must be 20 bytes, got {}",
                    n
                )))
            }
        };

        let tx = UnsignedTransaction {
            nonce: rlp.val_at(0).map_err(malformed)?,
            gas_price: bytes_u256(&rlp.val_at::<Vec<u8>>(1).map_err(malformed)?)?,
            gas_limit: rlp.val_at(2).map_err(malformed)?,
            to,
            value: bytes_u256(&rlp.val_at::<Vec<u8>>(4).map_err(malformed)?)?,
            data: rlp.val_at(5).map_err(malformed)?,
        };
        let v: u64 = rlp.val_at(6).map_err(malformed)?;
        let r = bytes_u256(&rlp.val_at::<Vec<u8>>(7).map_err(malformed)?)?;
        let s = bytes_u256(&rlp.val_at::<Vec<u8>>(8).map_err(malformed)?)?;

        Ok(Self {
            tx,
            v,
            r,
            s,
            hash: B256::from(keccak256(raw)),
            raw: raw.to_vec(),
        })
    }

    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Canonical RLP encoding as broadcast.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    pub fn r(&self) -> U256 {
        self.r
    }

    pub fn s(&self) -> U256 {
        self.s
    }

    /// Chain id folded into `v`, if the signature is replay-protected.
    pub fn chain_id(&self) -> Option<u64> {
        (self.v >= 35).then(|| (self.v - 35) / 2)
    }
}

/// Minimal big-endian bytes; zero encodes as the empty string.
pub(crate) fn u256_bytes(value: U256) -> Vec<u8> {
    value.to_be_bytes_trimmed_vec()
}

fn bytes_u256(bytes: &[u8]) -> Result<U256> {
    if bytes.len() > 32 {
        return Err(ToolkitError::SigningFailed(format!(
            "integer field of {} bytes exceeds 256 bits",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnsignedTransaction {
        UnsignedTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_signed_roundtrip_through_rlp() {
        let signed = SignedTransaction::new(sample(), 37, U256::from(7u8), U256::from(11u8));
        let decoded = SignedTransaction::decode(signed.raw()).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.chain_id(), Some(1));
    }

    #[test]
    fn test_contract_creation_encodes_empty_recipient() {
        let mut tx = sample();
        tx.to = None;
        tx.data = vec![0x60, 0x80];
        assert!(tx.is_contract_creation());

        let signed = SignedTransaction::new(tx, 27, U256::from(1u8), U256::from(1u8));
        let decoded = SignedTransaction::decode(signed.raw()).unwrap();
        assert!(decoded.transaction().to.is_none());
        assert_eq!(decoded.chain_id(), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SignedTransaction::decode(&[0xc0]).is_err());
        assert!(SignedTransaction::decode(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn test_u256_bytes_minimal() {
        assert!(u256_bytes(U256::ZERO).is_empty());
        assert_eq!(u256_bytes(U256::from(0x0400u64)), vec![0x04, 0x00]);
    }
}
