use alloy_primitives::{Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use rlp::RlpStream;
use tracing::debug;

use super::{SignedTransaction, TransactionRequest, UnsignedTransaction};
use crate::abi::keccak256;
use crate::chain::ChainClient;
use crate::error::{Result, ToolkitError};
use crate::keys::{pubkey_to_address, PrivateKey};
use crate::pool::ChainConfig;

/// Signing scheme in force at a given block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    /// Pre-EIP-155: `v` is 27 or 28, no chain id in the hash
    Homestead,
    /// Replay-protected: chain id folded into both the hash and `v`
    Eip155 { chain_id: u64 },
}

impl Signer {
    pub fn for_block(config: &ChainConfig, block_number: u64) -> Self {
        if config.is_eip155(block_number) {
            Signer::Eip155 {
                chain_id: config.chain_id,
            }
        } else {
            Signer::Homestead
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Signer::Homestead => None,
            Signer::Eip155 { chain_id } => Some(*chain_id),
        }
    }

    /// keccak256 of the RLP payload the signature commits to.
    pub fn signing_hash(&self, tx: &UnsignedTransaction) -> B256 {
        let mut stream = match self {
            Signer::Homestead => RlpStream::new_list(6),
            Signer::Eip155 { .. } => RlpStream::new_list(9),
        };
        tx.rlp_append_fields(&mut stream);
        if let Signer::Eip155 { chain_id } = self {
            stream.append(chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        B256::from(keccak256(stream.out()))
    }

    /// Sign `tx` with `key`, producing a low-s recoverable signature.
    pub fn sign(&self, tx: UnsignedTransaction, key: &PrivateKey) -> Result<SignedTransaction> {
        let hash = self.signing_hash(&tx);
        let (signature, recid) = key
            .signing_key()
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| ToolkitError::SigningFailed(e.to_string()))?;

        let (signature, recid) = match signature.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced()),
            ),
            None => (signature, recid),
        };

        let rs = signature.to_bytes();
        let r = U256::from_be_slice(&rs[..32]);
        let s = U256::from_be_slice(&rs[32..]);
        let v = self.v(recid.to_byte())?;
        debug!(
            "Signed tx with nonce {} for {} (v={})",
            tx.nonce,
            key.address(),
            v
        );
        Ok(SignedTransaction::new(tx, v, r, s))
    }

    fn v(&self, recid: u8) -> Result<u64> {
        self.v_base()
            .and_then(|base| base.checked_add(u64::from(recid)))
            .ok_or_else(|| {
                ToolkitError::SigningFailed(format!("chain id {:?} too large for v", self.chain_id()))
            })
    }

    /// `v` for recovery id 0: 27, or `35 + 2 * chain_id`.
    fn v_base(&self) -> Option<u64> {
        match self {
            Signer::Homestead => Some(27),
            Signer::Eip155 { chain_id } => chain_id.checked_mul(2)?.checked_add(35),
        }
    }

    /// Recovery id encoded in `v` under this scheme.
    fn recovery_id(&self, v: u64) -> Option<u8> {
        let recid = v.checked_sub(self.v_base()?)?;
        u8::try_from(recid).ok().filter(|id| *id <= 1)
    }
}

impl ChainClient {
    /// Sign with the scheme the network uses at its current head.
    pub async fn sign_transaction(&self, tx: UnsignedTransaction, key: &PrivateKey) -> Result<SignedTransaction> {
        let config = self.chain_config().await?;
        let block_number = self.latest_block_number().await?;
        let signer = Signer::for_block(&config, block_number);
        debug!(
            "Signing tx on behalf of {} with {:?} at block {}",
            key.address(),
            signer,
            block_number
        );
        signer.sign(tx, key)
    }

    /// Build and sign in one step. The key is parsed before any network call.
    pub async fn sign_tx(&self, request: &TransactionRequest, private_key: &str) -> Result<SignedTransaction> {
        let key = PrivateKey::from_hex(private_key)?;
        let tx = self.build_transaction(request).await?;
        let signed = self.sign_transaction(tx, &key).await?;
        debug!("Signed tx {} for broadcast", signed.hash());
        Ok(signed)
    }
}

/// Address whose key produced the transaction's signature.
pub fn recover_sender(tx: &SignedTransaction) -> Result<Address> {
    let signer = match tx.chain_id() {
        Some(chain_id) => Signer::Eip155 { chain_id },
        None => Signer::Homestead,
    };
    let recid = signer
        .recovery_id(tx.v())
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| ToolkitError::SigningFailed(format!("invalid v {}", tx.v())))?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&tx.r().to_be_bytes::<32>());
    rs[32..].copy_from_slice(&tx.s().to_be_bytes::<32>());
    let signature = Signature::from_slice(&rs).map_err(|e| ToolkitError::SigningFailed(e.to_string()))?;

    let hash = signer.signing_hash(tx.transaction());
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recid)
        .map_err(|e| ToolkitError::SigningFailed(e.to_string()))?;
    Ok(pubkey_to_address(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    // Worked example from EIP-155.
    fn eip155_example() -> (UnsignedTransaction, PrivateKey) {
        let tx = UnsignedTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Vec::new(),
        };
        let key = PrivateKey::from_hex(
            "4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        (tx, key)
    }

    #[test]
    fn test_eip155_signing_hash() {
        let (tx, _) = eip155_example();
        let hash = Signer::Eip155 { chain_id: 1 }.signing_hash(&tx);
        assert_eq!(
            hex::encode(hash),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signature() {
        let (tx, key) = eip155_example();
        let signed = Signer::Eip155 { chain_id: 1 }.sign(tx, &key).unwrap();
        assert_eq!(signed.v(), 37);
        assert_eq!(
            hex::encode(signed.raw()),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_signing_is_deterministic_and_recoverable() {
        let key = PrivateKey::from_hex(DEV_KEY).unwrap();
        let (tx, _) = eip155_example();
        let signer = Signer::Eip155 { chain_id: 31337 };

        assert_eq!(signer.signing_hash(&tx), signer.signing_hash(&tx));
        let a = signer.sign(tx.clone(), &key).unwrap();
        let b = signer.sign(tx, &key).unwrap();
        assert_eq!(a.hash(), b.hash());

        assert_eq!(a.chain_id(), Some(31337));
        assert!(a.v() == 35 + 2 * 31337 || a.v() == 36 + 2 * 31337);
        assert_eq!(recover_sender(&a).unwrap(), key.address());
    }

    #[test]
    fn test_homestead_signature() {
        let key = PrivateKey::from_hex(DEV_KEY).unwrap();
        let (tx, _) = eip155_example();
        let signed = Signer::Homestead.sign(tx, &key).unwrap();
        assert!(signed.v() == 27 || signed.v() == 28);
        assert_eq!(signed.chain_id(), None);
        assert_eq!(recover_sender(&signed).unwrap(), key.address());
    }

    #[test]
    fn test_low_s() {
        let key = PrivateKey::from_hex(DEV_KEY).unwrap();
        let half_order = U256::from_str_radix(
            "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
            16,
        )
        .unwrap();
        for nonce in 0..8 {
            let (mut tx, _) = eip155_example();
            tx.nonce = nonce;
            let signed = Signer::Eip155 { chain_id: 1 }.sign(tx, &key).unwrap();
            assert!(signed.s() <= half_order);
        }
    }

    #[test]
    fn test_signer_for_block() {
        let mainnet = ChainConfig::for_chain_id(1);
        assert_eq!(Signer::for_block(&mainnet, 0), Signer::Homestead);
        assert_eq!(
            Signer::for_block(&mainnet, 3_000_000),
            Signer::Eip155 { chain_id: 1 }
        );
        let dev = ChainConfig::for_chain_id(1337);
        assert_eq!(Signer::for_block(&dev, 0).chain_id(), Some(1337));
    }

    #[test]
    fn test_oversized_chain_id_fails_signing() {
        let key = PrivateKey::from_hex(DEV_KEY).unwrap();
        let (tx, _) = eip155_example();
        for chain_id in [u64::MAX, u64::MAX / 2, u64::MAX / 2 - 16] {
            let result = Signer::Eip155 { chain_id }.sign(tx.clone(), &key);
            assert!(
                matches!(result, Err(ToolkitError::SigningFailed(_))),
                "chain id {}",
                chain_id
            );
        }

        // Largest chain id whose v still fits.
        let chain_id = (u64::MAX - 36) / 2;
        let signed = Signer::Eip155 { chain_id }.sign(tx, &key).unwrap();
        assert_eq!(signed.chain_id(), Some(chain_id));
        assert_eq!(recover_sender(&signed).unwrap(), key.address());
    }
}
