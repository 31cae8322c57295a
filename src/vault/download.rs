//! Download and preview operations
//!
//! Decrypted content leaves the vault packaged as `FileDownload`, carrying
//! the original display name, never the storage name.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::activity::{ActivityAction, ActivityTarget, NewActivity};
use crate::crypto::{self, FileKey, FileNonce};
use crate::db::{ActivityRepository, File, FileRepository};
use crate::error::{Result, VaultError};
use crate::storage::BlobStore;

use super::Vault;

/// Decrypted file content ready to serve
#[derive(Debug)]
pub struct FileDownload {
    pub file_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    /// Render in the browser instead of forcing a save dialog
    pub inline: bool,
}

impl IntoResponse for FileDownload {
    fn into_response(self) -> Response {
        let kind = if self.inline { "inline" } else { "attachment" };

        // Quoted fallback name must stay inside the ASCII header charset;
        // the full name travels RFC 5987 encoded beside it.
        let fallback: String = self
            .file_name
            .chars()
            .map(|c| {
                if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let encoded = urlencoding::encode(&self.file_name);
        let disposition = format!("{kind}; filename=\"{fallback}\"; filename*=UTF-8''{encoded}");

        let length = self.content.len();
        let built = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, self.mime_type.as_str())
            .header(header::CONTENT_LENGTH, length)
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::from(self.content));

        match built {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to build download response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl Vault {
    /// Decrypt a file for its owner as an attachment download
    pub async fn download_file(&self, user_id: &str, file_id: &str) -> Result<FileDownload> {
        let (file, content) = self.decrypted_content(user_id, file_id).await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Download,
                    ActivityTarget::File,
                    &file.id,
                )
                .with_details(json!({"name": file.original_name})),
            )
            .await?;

        tracing::info!(file = %file.id, "File downloaded");
        Ok(FileDownload {
            file_name: file.original_name,
            mime_type: file.mime_type,
            content,
            inline: false,
        })
    }

    /// Decrypt a file for inline browser preview
    pub async fn preview_file(&self, user_id: &str, file_id: &str) -> Result<FileDownload> {
        let (file, content) = self.decrypted_content(user_id, file_id).await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Preview,
                    ActivityTarget::File,
                    &file.id,
                )
                .with_details(json!({"name": file.original_name})),
            )
            .await?;

        tracing::debug!(file = %file.id, "File previewed");
        Ok(FileDownload {
            file_name: file.original_name,
            mime_type: file.mime_type,
            content,
            inline: true,
        })
    }

    pub(super) async fn decrypted_content(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> Result<(File, Vec<u8>)> {
        let file = FileRepository::new(self.db())
            .get(file_id)
            .await?
            .filter(|f| f.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound(format!("File not found: {file_id}")))?;

        let ciphertext = self.blobs().get(&file.storage_name).await?;
        let key = FileKey::from_slice(&file.encryption_key)?;
        let nonce = FileNonce::from_slice(&file.encryption_nonce)?;
        let content = crypto::decrypt(&ciphertext, &key, &nonce)?;

        Ok((file, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_header_carries_both_name_forms() {
        let download = FileDownload {
            file_name: "année \"1\".pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            content: b"%PDF".to_vec(),
            inline: false,
        };
        let response = download.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"ann_e _1_.pdf\""));
        assert!(disposition.contains("filename*=UTF-8''ann%C3%A9e%20%221%22.pdf"));

        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "4"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
    }

    #[test]
    fn preview_uses_inline_disposition() {
        let download = FileDownload {
            file_name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            content: vec![1, 2, 3],
            inline: true,
        };
        let response = download.into_response();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("inline;"));
    }
}
