//! Readonly storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and prevents write operations from executing, but
//! indicating success on return.

use async_trait::async_trait;
use coffer_envelope::ResourceType;

use crate::{BackendHandle, StorageBackend, backend::KeyStream, error::Result};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    fn origin(&self) -> &str {
        self.inner.origin()
    }

    async fn create(&self, config: &[u8]) -> Result<()> {
        tracing::info!(origin = self.inner.origin(), bytes = config.len(), "Skipping create during read-only mode");
        Ok(())
    }

    async fn open(&self) -> Result<Vec<u8>> {
        self.inner.open().await
    }

    fn list_stream<'a>(&'a self, resource: ResourceType) -> KeyStream<'a> {
        self.inner.list_stream(resource)
    }

    async fn exists(&self, resource: ResourceType, key: &str) -> Result<bool> {
        self.inner.exists(resource, key).await
    }

    async fn get(&self, resource: ResourceType, key: &str) -> Result<Vec<u8>> {
        self.inner.get(resource, key).await
    }

    async fn put(&self, resource: ResourceType, key: &str, data: &[u8]) -> Result<()> {
        tracing::info!(%resource, key, bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn delete(&self, resource: ResourceType, key: &str) -> Result<()> {
        tracing::info!(%resource, key, "Skipping delete during read-only mode");
        Ok(())
    }
}
