//! Repository configuration record.
//!
//! Stored by [`StorageBackend::create`](coffer_storage::StorageBackend::create)
//! as JSON inside a `config` envelope. The envelope is always tagged with
//! plain BLAKE3: the configuration has to be readable before any key exists.

use crate::encryption::{Encryption, KdfParams};
use crate::error::{ErrorKind, Result};
use coffer_envelope::hashing::DEFAULT_ALGORITHM;
use coffer_envelope::{Blake3, ResourceType, Version, current_version, seal, unseal_as};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compression {
    pub algorithm: String,
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: Version,
    pub repository_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Name of the hashing algorithm used for integrity tags and content
    /// addresses.
    pub hashing: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: current_version(ResourceType::Config),
            repository_id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc(),
            hashing: DEFAULT_ALGORITHM.to_string(),
            encryption: None,
            compression: None,
        }
    }
}

impl Configuration {
    /// Unencrypted configuration with a fresh repository identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypted configuration; returns the derived key for the first open.
    pub fn encrypted(kdf: KdfParams, passphrase: &str) -> Result<(Self, [u8; 32])> {
        let (encryption, key) = Encryption::new(kdf, passphrase)?;
        Ok((Self { encryption: Some(encryption), ..Self::default() }, key))
    }

    pub fn with_compression(mut self, algorithm: impl Into<String>, level: i32) -> Self {
        self.compression = Some(Compression { algorithm: algorithm.into(), level });
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Wrap into the bytes handed to the storage backend.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self).or_raise(|| ErrorKind::Config("could not encode".to_string()))?;
        Ok(seal(&Blake3, ResourceType::Config, &json))
    }

    /// Unwrap bytes read back from the storage backend.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (_version, json) = unseal_as(&Blake3, ResourceType::Config, bytes)
            .or_raise(|| ErrorKind::Config("damaged or unsupported configuration".to_string()))?;
        serde_json::from_slice(&json).or_raise(|| ErrorKind::Config("malformed configuration".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let config = Configuration::new().with_compression("zstd", 3);
        let bytes = config.to_bytes().unwrap();
        let back = Configuration::from_bytes(&bytes).unwrap();
        assert_eq!(back, config);
        assert!(!back.is_encrypted());
    }

    #[test]
    fn encrypted_round_trip() {
        let (config, key) = Configuration::encrypted(KdfParams::with_iterations(8), "pass").unwrap();
        let back = Configuration::from_bytes(&config.to_bytes().unwrap()).unwrap();
        let encryption = back.encryption.unwrap();
        assert!(encryption.verify(&key));
    }

    #[test]
    fn damaged_bytes_are_a_config_error() {
        let mut bytes = Configuration::new().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = Configuration::from_bytes(&bytes).unwrap_err();
        assert!(err.is_config_error());
        let err = Configuration::from_bytes(b"not an envelope").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn wrong_resource_type_is_rejected() {
        let bytes = seal(&Blake3, ResourceType::Snapshot, b"{}");
        assert!(Configuration::from_bytes(&bytes).unwrap_err().is_config_error());
    }

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(Configuration::new().repository_id, Configuration::new().repository_id);
    }
}
