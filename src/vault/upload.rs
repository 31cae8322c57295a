//! Upload operations
//!
//! Plaintext comes in, an encrypted blob and a file record come out. The
//! blob is written before the row so a crash can only leave an orphaned
//! blob, never a record pointing at nothing.

use serde_json::json;
use uuid::Uuid;

use crate::activity::{ActivityAction, ActivityTarget, NewActivity};
use crate::chunks::ChunkDir;
use crate::crypto;
use crate::db::{ActivityRepository, File, FileRepository, NewFile, UserRepository};
use crate::error::{Result, VaultError};
use crate::naming;
use crate::storage::BlobStore;

use super::Vault;

/// Metadata accompanying an upload
pub struct UploadRequest<'a> {
    pub original_name: &'a str,
    pub folder_id: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl Vault {
    /// Encrypt and store one whole payload as a new file
    pub async fn upload_file(
        &self,
        user_id: &str,
        request: &UploadRequest<'_>,
        data: &[u8],
    ) -> Result<File> {
        if data.len() as u64 > self.config().limits.max_upload_bytes {
            return Err(VaultError::BadRequest(format!(
                "File exceeds the maximum upload size of {}",
                naming::format_size(self.config().limits.max_upload_bytes)
            )));
        }

        let blob = crypto::encrypt(data, None)?;
        let storage_name = naming::generate_storage_name(request.original_name);
        let mime_type = naming::infer_mime_type(request.original_name);

        self.blobs().put(&storage_name, &blob.ciphertext).await?;

        let files = FileRepository::new(self.db());
        let created = files
            .create(&NewFile {
                storage_name: &storage_name,
                original_name: request.original_name,
                file_size: data.len() as i64,
                mime_type: &mime_type,
                user_id,
                encryption_key: blob.key.bytes(),
                encryption_nonce: blob.nonce.bytes(),
                folder_id: request.folder_id,
                description: request.description,
            })
            .await;

        let created = match created {
            Ok(file) => file,
            Err(e) => {
                // The record never existed; drop the orphaned blob
                let _ = self.blobs().delete(&storage_name).await;
                return Err(e);
            }
        };

        UserRepository::new(self.db())
            .add_storage_used(user_id, created.file_size)
            .await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Upload,
                    ActivityTarget::File,
                    &created.id,
                )
                .with_details(json!({
                    "name": created.original_name,
                    "size": created.file_size,
                })),
            )
            .await?;

        tracing::info!(
            file = %created.id,
            name = %created.original_name,
            bytes = created.file_size,
            "Stored uploaded file"
        );
        Ok(created)
    }

    /// Open a fresh chunk session under the configured temp directory
    pub async fn begin_chunked_upload(&self) -> Result<ChunkDir> {
        let dir = self
            .config()
            .storage
            .temp_dir
            .join(format!("upload_{}", Uuid::new_v4()));
        Ok(ChunkDir::create(dir).await?)
    }

    /// Assemble a completed chunk session and store the result.
    ///
    /// The session directory is consumed whether assembly succeeds or not;
    /// a failed session cannot be resumed.
    pub async fn finish_chunked_upload(
        &self,
        user_id: &str,
        chunks: ChunkDir,
        request: &UploadRequest<'_>,
    ) -> Result<File> {
        let assembled = self
            .config()
            .storage
            .temp_dir
            .join(format!("assembled_{}", Uuid::new_v4()));

        let total = match chunks.assemble(&assembled).await {
            Ok(total) => total,
            Err(e) => {
                let _ = chunks.remove().await;
                return Err(e.into());
            }
        };
        chunks.remove().await?;

        if total > self.config().limits.max_upload_bytes {
            let _ = tokio::fs::remove_file(&assembled).await;
            return Err(VaultError::BadRequest(format!(
                "File exceeds the maximum upload size of {}",
                naming::format_size(self.config().limits.max_upload_bytes)
            )));
        }

        let data = tokio::fs::read(&assembled).await?;
        let _ = tokio::fs::remove_file(&assembled).await;

        tracing::debug!(bytes = total, "Assembled chunked upload");
        self.upload_file(user_id, request, &data).await
    }
}
