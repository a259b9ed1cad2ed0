use aes::Aes128;
use alloy_primitives::Address;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PrivateKey;
use crate::abi::keccak256;
use crate::config::KeystoreParams;
use crate::error::{Result, ToolkitError};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const KEYSTORE_VERSION: u32 = 3;
const CIPHER: &str = "aes-128-ctr";
const KDF: &str = "scrypt";

// Upper bounds on record-supplied scrypt parameters. 128 * n * r bytes of
// memory are needed; the cap matches the standard n = 2^18, r = 8 profile.
const MAX_SCRYPT_MEMORY: u64 = 256 * 1024 * 1024;
const MAX_SCRYPT_P: u32 = 16;
const MAX_DKLEN: usize = 64;

/// Unencrypted keypair record: the key in lowercase hex, no `0x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairRecord {
    pub id: String,
    pub address: String,
    pub privatekey: String,
    pub version: u32,
}

impl KeypairRecord {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ToolkitError::KeystoreDecryptionFailed(format!("failed to parse keypair: {}", e))
        })
    }

    /// Parse the embedded key, checking it against the recorded address.
    pub fn private_key(&self) -> Result<PrivateKey> {
        let key = PrivateKey::from_hex(&self.privatekey)
            .map_err(|e| ToolkitError::KeystoreDecryptionFailed(e.to_string()))?;
        if !address_matches(&self.address, &key) {
            return Err(ToolkitError::KeystoreDecryptionFailed(format!(
                "key does not match address {}",
                self.address
            )));
        }
        Ok(key)
    }
}

/// Plaintext JSON export of a keypair with a fresh v4 id.
pub fn export_keypair_json(address: Address, key: &PrivateKey) -> Result<String> {
    let record = KeypairRecord {
        id: Uuid::new_v4().to_string(),
        address: hex::encode(address.as_slice()),
        privatekey: key.to_hex(),
        version: KEYSTORE_VERSION,
    };
    debug!("Exported plaintext keypair {} for address {}", record.id, address);
    serde_json::to_string(&record)
        .map_err(|e| ToolkitError::KeyDerivationFailed(format!("failed to marshal keypair: {}", e)))
}

/// Version 3 encrypted keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreRecord {
    pub id: String,
    /// Lowercase hex, no `0x`
    pub address: String,
    pub version: u32,
    pub crypto: CryptoJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoJson {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: ScryptParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub n: u32,
    pub r: u32,
    pub p: u32,
    pub dklen: usize,
    pub salt: String,
}

impl KeystoreRecord {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ToolkitError::KeyDerivationFailed(format!("failed to marshal keystore: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ToolkitError::KeystoreDecryptionFailed(format!("failed to parse keystore: {}", e))
        })
    }
}

/// Encrypt `key` under `passphrase` with the default scrypt parameters.
pub fn export_encrypted_keystore(address: Address, key: &PrivateKey, passphrase: &str) -> Result<KeystoreRecord> {
    export_encrypted_keystore_with(address, key, passphrase, &KeystoreParams::default())
}

pub fn export_encrypted_keystore_with(
    address: Address,
    key: &PrivateKey,
    passphrase: &str,
    params: &KeystoreParams,
) -> Result<KeystoreRecord> {
    let mut salt = [0u8; 32];
    random_bytes(&mut salt)?;
    let derived = derive_key(passphrase, &salt, params)
        .map_err(ToolkitError::KeyDerivationFailed)?;

    let mut iv = [0u8; 16];
    random_bytes(&mut iv)?;
    let mut ciphertext = key.to_bytes().to_vec();
    apply_aes_ctr(&derived[..16], &iv, &mut ciphertext).map_err(ToolkitError::KeyDerivationFailed)?;

    let mac = compute_mac(&derived, &ciphertext);
    let id = Uuid::new_v4();
    debug!("Encrypted keystore {} for address {}", id, address);

    Ok(KeystoreRecord {
        id: id.to_string(),
        address: hex::encode(address.as_slice()),
        version: KEYSTORE_VERSION,
        crypto: CryptoJson {
            cipher: CIPHER.to_string(),
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams { iv: hex::encode(iv) },
            kdf: KDF.to_string(),
            kdfparams: ScryptParams {
                n: params.n,
                r: params.r,
                p: params.p,
                dklen: params.dklen,
                salt: hex::encode(salt),
            },
            mac: hex::encode(mac),
        },
    })
}

/// Recover the private key from a record; fails on a wrong passphrase.
pub fn decrypt_keystore(record: &KeystoreRecord, passphrase: &str) -> Result<PrivateKey> {
    let fail = |reason: String| ToolkitError::KeystoreDecryptionFailed(reason);
    let crypto = &record.crypto;

    if crypto.cipher != CIPHER {
        return Err(fail(format!("unsupported cipher {}", crypto.cipher)));
    }
    if crypto.kdf != KDF {
        return Err(fail(format!("unsupported kdf {}", crypto.kdf)));
    }

    let salt = hex::decode(&crypto.kdfparams.salt).map_err(|e| fail(format!("bad salt: {}", e)))?;
    let iv = hex::decode(&crypto.cipherparams.iv).map_err(|e| fail(format!("bad iv: {}", e)))?;
    let mut plaintext =
        hex::decode(&crypto.ciphertext).map_err(|e| fail(format!("bad ciphertext: {}", e)))?;
    let expected_mac = hex::decode(&crypto.mac).map_err(|e| fail(format!("bad mac: {}", e)))?;

    let params = KeystoreParams {
        n: crypto.kdfparams.n,
        r: crypto.kdfparams.r,
        p: crypto.kdfparams.p,
        dklen: crypto.kdfparams.dklen,
    };
    let derived = derive_key(passphrase, &salt, &params).map_err(fail)?;

    let mac = compute_mac(&derived, &plaintext);
    if !bool::from(mac.as_slice().ct_eq(expected_mac.as_slice())) {
        warn!("Keystore {} MAC mismatch", record.id);
        return Err(fail("MAC mismatch; wrong passphrase?".to_string()));
    }

    apply_aes_ctr(&derived[..16], &iv, &mut plaintext).map_err(fail)?;
    let key = PrivateKey::from_bytes(&plaintext).map_err(|e| fail(e.to_string()))?;

    if !address_matches(&record.address, &key) {
        return Err(fail(format!("decrypted key does not match address {}", record.address)));
    }
    Ok(key)
}

/// An empty recorded address matches any key.
fn address_matches(recorded: &str, key: &PrivateKey) -> bool {
    recorded.is_empty()
        || recorded
            .trim_start_matches("0x")
            .eq_ignore_ascii_case(&hex::encode(key.address().as_slice()))
}

fn derive_key(passphrase: &str, salt: &[u8], params: &KeystoreParams) -> std::result::Result<Vec<u8>, String> {
    if !params.n.is_power_of_two() || params.n < 2 {
        return Err(format!("scrypt n must be a power of two, got {}", params.n));
    }
    if params.dklen < 32 || params.dklen > MAX_DKLEN {
        return Err(format!("scrypt dklen must be within 32..={}, got {}", MAX_DKLEN, params.dklen));
    }
    let memory = 128u64
        .saturating_mul(u64::from(params.n))
        .saturating_mul(u64::from(params.r));
    if memory > MAX_SCRYPT_MEMORY {
        return Err(format!(
            "scrypt n={} r={} needs {} bytes, limit is {}",
            params.n, params.r, memory, MAX_SCRYPT_MEMORY
        ));
    }
    if params.p == 0 || params.p > MAX_SCRYPT_P {
        return Err(format!("scrypt p must be within 1..={}, got {}", MAX_SCRYPT_P, params.p));
    }
    let log_n = params.n.trailing_zeros() as u8;
    let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, params.dklen)
        .map_err(|e| format!("invalid scrypt params: {}", e))?;

    let mut derived = vec![0u8; params.dklen];
    scrypt::scrypt(passphrase.as_bytes(), salt, &scrypt_params, &mut derived)
        .map_err(|e| format!("scrypt failed: {}", e))?;
    Ok(derived)
}

fn apply_aes_ctr(key: &[u8], iv: &[u8], buf: &mut [u8]) -> std::result::Result<(), String> {
    let mut cipher =
        Aes128Ctr::new_from_slices(key, iv).map_err(|e| format!("invalid AES key or iv: {}", e))?;
    cipher.apply_keystream(buf);
    Ok(())
}

fn compute_mac(derived: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(16 + ciphertext.len());
    preimage.extend_from_slice(&derived[16..32]);
    preimage.extend_from_slice(ciphertext);
    keccak256(preimage)
}

fn random_bytes(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| ToolkitError::KeyDerivationFailed(format!("failed to read OS randomness: {}", e)))
}
