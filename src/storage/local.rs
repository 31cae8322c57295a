//! Local filesystem blob storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{BlobStore, BlobStoreError};

/// Blob storage on a local directory
///
/// Every blob is one file directly under the root. Names are restricted to
/// a flat character set, so a name can never escape the root or shadow the
/// temp files used during writes.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, BlobStoreError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(BlobStoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), BlobStoreError> {
        let path = self.blob_path(name)?;
        if path.exists() {
            return Err(BlobStoreError::AlreadyExists(name.to_string()));
        }

        // Write to a dotted temp name, then rename. Readers never observe a
        // half-written blob, and the temp name can never collide with a
        // valid blob name.
        let tmp = self.root.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, data).await?;
        match tokio::fs::rename(&tmp, &path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e.into())
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), BlobStoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, name: &str) -> Result<bool, BlobStoreError> {
        Ok(self.blob_path(name)?.exists())
    }
}
