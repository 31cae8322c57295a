//! Storage backends for ciphertext blobs
//!
//! Blobs are opaque encrypted payloads addressed by their storage name.
//! Backends are write-once: a name is never overwritten, so a stored blob
//! can only change by being deleted and re-created under a new name.

mod local;

pub use local::LocalBlobStore;

use async_trait::async_trait;

/// Blob storage failures
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for blob storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under `name`. Refuses names that already hold a blob.
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), BlobStoreError>;

    /// Read a blob back in full
    async fn get(&self, name: &str) -> Result<Vec<u8>, BlobStoreError>;

    /// Remove a blob
    async fn delete(&self, name: &str) -> Result<(), BlobStoreError>;

    /// Check whether a blob exists
    async fn contains(&self, name: &str) -> Result<bool, BlobStoreError>;
}
