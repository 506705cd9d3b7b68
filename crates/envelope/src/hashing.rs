//! Hashing providers and content addresses.
//!
//! A [`Hashing`] provider hands out incremental [`Digest`]s. Repositories
//! without a key use a plain hash; encrypted repositories use a keyed MAC so
//! that content addresses cannot be computed without the key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Size in bytes of every content address and integrity tag.
pub const MAC_SIZE: usize = 32;
/// Name of the default algorithm, as written into repository configuration.
pub const DEFAULT_ALGORITHM: &str = "BLAKE3";

pub type HashingHandle = Arc<dyn Hashing>;

/// Fixed-size digest identifying immutable bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Mac([u8; MAC_SIZE]);

impl Mac {
    pub const fn from_bytes(bytes: [u8; MAC_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding, used as storage and cache key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Option<Self> {
        let mut bytes = [0u8; MAC_SIZE];
        hex::decode_to_slice(value, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Constant-time comparison, for verifying integrity tags.
    pub fn verify(&self, other: &Mac) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(other.0)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({})", self.to_hex())
    }
}

impl Serialize for Mac {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Mac {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Mac::from_hex(&value).ok_or_else(|| serde::de::Error::custom("invalid content address"))
    }
}

/// Incremental hash computation.
pub trait Digest: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Mac;
}

/// Hashing capability injected into repositories and envelopes.
pub trait Hashing: Send + Sync {
    /// Algorithm name recorded in the repository configuration.
    fn algorithm(&self) -> &str;

    /// Start a new incremental computation.
    fn digest(&self) -> Box<dyn Digest>;

    /// Hash a complete buffer.
    fn compute(&self, data: &[u8]) -> Mac {
        let mut digest = self.digest();
        digest.update(data);
        digest.finalize()
    }
}

impl Digest for blake3::Hasher {
    fn update(&mut self, data: &[u8]) {
        blake3::Hasher::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Mac {
        Mac(*blake3::Hasher::finalize(&self).as_bytes())
    }
}

/// Unkeyed BLAKE3.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3;

impl Hashing for Blake3 {
    fn algorithm(&self) -> &str {
        DEFAULT_ALGORITHM
    }

    fn digest(&self) -> Box<dyn Digest> {
        Box::new(blake3::Hasher::new())
    }
}

/// BLAKE3 in keyed mode, used as a MAC once a repository key is known.
#[derive(Clone)]
pub struct Blake3Mac {
    key: [u8; 32],
}

impl Blake3Mac {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl fmt::Debug for Blake3Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blake3Mac").finish_non_exhaustive()
    }
}

impl Hashing for Blake3Mac {
    fn algorithm(&self) -> &str {
        DEFAULT_ALGORITHM
    }

    fn digest(&self) -> Box<dyn Digest> {
        Box::new(blake3::Hasher::new_keyed(&self.key))
    }
}

/// Resolve a provider by algorithm name, keyed when a key is supplied.
///
/// Returns `None` for algorithms this build does not know.
pub fn hasher(algorithm: &str, key: Option<[u8; 32]>) -> Option<HashingHandle> {
    if !algorithm.eq_ignore_ascii_case(DEFAULT_ALGORITHM) {
        tracing::warn!(algorithm, "Unknown hashing algorithm requested");
        return None;
    }
    Some(match key {
        Some(key) => Arc::new(Blake3Mac::new(key)),
        None => Arc::new(Blake3),
    })
}
