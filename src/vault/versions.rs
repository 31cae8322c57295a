//! Version chain operations

use serde_json::json;

use crate::activity::{ActivityAction, ActivityTarget, NewActivity};
use crate::crypto;
use crate::db::{ActivityRepository, File, FileRepository, NewFile, UserRepository};
use crate::error::{Result, VaultError};
use crate::naming;
use crate::storage::BlobStore;

use super::Vault;

impl Vault {
    /// Store a new version on top of a file's current head.
    ///
    /// `file_id` may be any member of the chain; the payload supersedes
    /// whatever is current. A concurrent supersede of the same head loses
    /// with `VersionConflict` and stores nothing.
    pub async fn upload_new_version(
        &self,
        user_id: &str,
        file_id: &str,
        data: &[u8],
        description: Option<&str>,
    ) -> Result<File> {
        let files = FileRepository::new(self.db());
        let head = files.current_of_chain(file_id).await?;
        if head.user_id != user_id {
            return Err(VaultError::NotFound(format!("File not found: {file_id}")));
        }

        if data.len() as u64 > self.config().limits.max_upload_bytes {
            return Err(VaultError::BadRequest(format!(
                "File exceeds the maximum upload size of {}",
                naming::format_size(self.config().limits.max_upload_bytes)
            )));
        }

        let blob = crypto::encrypt(data, None)?;
        let storage_name = naming::generate_storage_name(&head.original_name);
        let mime_type = naming::infer_mime_type(&head.original_name);

        self.blobs().put(&storage_name, &blob.ciphertext).await?;

        let superseded = files
            .supersede(
                &head.id,
                &NewFile {
                    storage_name: &storage_name,
                    original_name: &head.original_name,
                    file_size: data.len() as i64,
                    mime_type: &mime_type,
                    user_id,
                    encryption_key: blob.key.bytes(),
                    encryption_nonce: blob.nonce.bytes(),
                    folder_id: head.folder_id.as_deref(),
                    description,
                },
            )
            .await;

        let created = match superseded {
            Ok(file) => file,
            Err(e) => {
                // The chain never saw this version; drop the orphaned blob
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
                    ActivityAction::Update,
                    ActivityTarget::File,
                    &created.id,
                )
                .with_details(json!({
                    "name": created.original_name,
                    "version": created.version,
                })),
            )
            .await?;

        tracing::info!(
            file = %created.id,
            version = created.version,
            "Stored new file version"
        );
        Ok(created)
    }

    /// Every version in a file's chain, newest first
    pub async fn list_versions(&self, user_id: &str, file_id: &str) -> Result<Vec<File>> {
        let members = FileRepository::new(self.db()).chain_members(file_id).await?;
        match members.first() {
            Some(member) if member.user_id == user_id => Ok(members),
            _ => Err(VaultError::NotFound(format!("File not found: {file_id}"))),
        }
    }

    /// Delete a file and every version in its chain.
    ///
    /// Shares on any member disappear with the rows; blobs are removed
    /// best-effort and the owner's storage accounting is reduced by the
    /// whole chain.
    pub async fn delete_file(&self, user_id: &str, file_id: &str) -> Result<()> {
        let files = FileRepository::new(self.db());
        let target = files
            .get(file_id)
            .await?
            .filter(|f| f.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound(format!("File not found: {file_id}")))?;

        let removed = files.delete_chain(file_id).await?;

        let mut freed: i64 = 0;
        for member in &removed {
            if let Err(e) = self.blobs().delete(&member.storage_name).await {
                tracing::warn!(
                    blob = %member.storage_name,
                    error = %e,
                    "Failed to remove blob of deleted version"
                );
            }
            freed += member.file_size;
        }

        UserRepository::new(self.db())
            .release_storage(user_id, freed)
            .await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Delete,
                    ActivityTarget::File,
                    file_id,
                )
                .with_details(json!({
                    "name": target.original_name,
                    "versions": removed.len(),
                })),
            )
            .await?;

        tracing::info!(
            file = %file_id,
            versions = removed.len(),
            bytes = freed,
            "Deleted file chain"
        );
        Ok(())
    }
}
