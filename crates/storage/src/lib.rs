//! Durable blob storage for coffer repositories.
//!
//! Blobs are addressed by a [`ResourceType`](coffer_envelope::ResourceType)
//! and a validated key. Backends are shared between tasks as a
//! [`BackendHandle`].

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::StorageBackend;
pub use crate::key::validate as validate_key;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
