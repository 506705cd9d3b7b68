//! Passphrase key derivation and canary verification.
//!
//! The key is stretched with iterated keyed BLAKE3 over a random salt. The
//! canary is a MAC of a fixed context and the salt under the derived key: it
//! lets an open verify a passphrase without touching any real payload.

use crate::error::{ErrorKind, Result};
use coffer_envelope::Mac;
use serde::{Deserialize, Serialize};

pub const KDF_ALGORITHM: &str = "BLAKE3-ITERATED";
pub const DEFAULT_ITERATIONS: u32 = 200_000;
pub const SALT_SIZE: usize = 16;

const KDF_CONTEXT: &str = "coffer 2026-01-01 passphrase key derivation";
const CANARY_CONTEXT: &[u8] = b"coffer canary v1";

/// Parameters needed to re-derive a key from a passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    #[serde(with = "hex::serde")]
    pub salt: [u8; SALT_SIZE],
    pub iterations: u32,
}

impl KdfParams {
    /// Fresh parameters with a random salt.
    pub fn generate() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self { algorithm: KDF_ALGORITHM.to_string(), salt: rand::random(), iterations }
    }
}

/// Encryption block of a repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    pub kdf: KdfParams,
    pub canary: Mac,
}

impl Encryption {
    /// Build the block for a newly created repository, returning the derived
    /// key alongside it.
    pub fn new(kdf: KdfParams, passphrase: &str) -> Result<(Self, [u8; 32])> {
        let key = derive_key(&kdf, passphrase)?;
        let canary = derive_canary(&kdf, &key);
        Ok((Self { kdf, canary }, key))
    }

    /// Constant-time check that `key` reproduces the stored canary.
    pub fn verify(&self, key: &[u8; 32]) -> bool {
        self.canary.verify(&derive_canary(&self.kdf, key))
    }
}

/// Stretch a passphrase into a 32-byte key.
pub fn derive_key(params: &KdfParams, passphrase: &str) -> Result<[u8; 32]> {
    if params.algorithm != KDF_ALGORITHM {
        exn::bail!(ErrorKind::Config(format!("unsupported key derivation: {}", params.algorithm)));
    }
    if params.iterations == 0 {
        exn::bail!(ErrorKind::Config("key derivation needs at least one iteration".to_string()));
    }
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT);
    hasher.update(&params.salt);
    hasher.update(passphrase.as_bytes());
    let mut key: [u8; 32] = hasher.finalize().into();
    for round in 1..params.iterations {
        let mut hasher = blake3::Hasher::new_keyed(&key);
        hasher.update(&params.salt);
        hasher.update(&round.to_be_bytes());
        key = hasher.finalize().into();
    }
    Ok(key)
}

pub fn derive_canary(params: &KdfParams, key: &[u8; 32]) -> Mac {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(CANARY_CONTEXT);
    hasher.update(&params.salt);
    Mac::from_bytes(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KdfParams {
        KdfParams::with_iterations(64)
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = params();
        assert_eq!(derive_key(&params, "hunter2").unwrap(), derive_key(&params, "hunter2").unwrap());
        assert_ne!(derive_key(&params, "hunter2").unwrap(), derive_key(&params, "hunter3").unwrap());
    }

    #[test]
    fn salt_and_iterations_change_the_key() {
        let a = params();
        let b = KdfParams { salt: [0; SALT_SIZE], ..a.clone() };
        let c = KdfParams { iterations: 65, ..a.clone() };
        let key = derive_key(&a, "pass").unwrap();
        assert_ne!(key, derive_key(&b, "pass").unwrap());
        assert_ne!(key, derive_key(&c, "pass").unwrap());
    }

    #[test]
    fn canary_round_trip() {
        let (encryption, key) = Encryption::new(params(), "correct horse").unwrap();
        assert!(encryption.verify(&key));
        let wrong = derive_key(&encryption.kdf, "battery staple").unwrap();
        assert!(!encryption.verify(&wrong));
    }

    #[test]
    fn unsupported_parameters() {
        let mut params = params();
        params.iterations = 0;
        assert!(matches!(&*derive_key(&params, "x").unwrap_err(), ErrorKind::Config(_)));
        params.iterations = 1;
        params.algorithm = "scrypt".to_string();
        assert!(matches!(&*derive_key(&params, "x").unwrap_err(), ErrorKind::Config(_)));
    }

    #[test]
    fn salt_is_hex_in_json() {
        let params = KdfParams { algorithm: KDF_ALGORITHM.to_string(), salt: [0xab; SALT_SIZE], iterations: 3 };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["salt"], "ab".repeat(SALT_SIZE));
        let back: KdfParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }
}
