//! Typed, versioned and integrity-checked envelopes.
//!
//! Every resource a repository persists (configuration, snapshot headers,
//! tree records, object bytes) is wrapped in an envelope before it reaches the
//! cache or a storage backend:
//!
//! - **Resource type** ([`ResourceType`]) so that a blob can never be decoded
//!   as something it isn't
//! - **Format version** ([`Version`]) scoped per resource type, with a
//!   registered supported range
//! - **Integrity tag** computed by an injected [`Hashing`] provider (plain
//!   hash, or keyed MAC for encrypted repositories)
//!
//! Encoding and decoding are both streaming ([`serialize`], [`deserialize`]);
//! [`seal`] and [`unseal`] are in-memory conveniences.

pub mod error;
pub mod hashing;
mod resources;
mod serialize;
mod versioning;

pub use crate::hashing::{Blake3, Blake3Mac, Hashing, HashingHandle, MAC_SIZE, Mac};
pub use crate::resources::ResourceType;
pub use crate::serialize::{HEADER_SIZE, MAGIC, Sealer, Unsealer, deserialize, seal, serialize, unseal, unseal_as};
pub use crate::versioning::{Version, current_version, is_supported};
