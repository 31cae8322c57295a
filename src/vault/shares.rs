//! Share link operations
//!
//! Creation, anonymous access, and revocation. Access runs the full gate
//! sequence: token lookup, state classification, password check, then the
//! atomic counter claim. Only a claimed slot gets decrypted bytes.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::activity::{ActivityAction, ActivityTarget, NewActivity};
use crate::crypto::{self, FileKey, FileNonce};
use crate::db::{ActivityRepository, FileRepository, NewShare, ShareRepository, UserRepository};
use crate::error::{Result, VaultError};
use crate::notify::{ShareNotice, ShareNotifier};
use crate::password;
use crate::shares::{generate_token, Share, ShareAccessError, ShareState};
use crate::storage::BlobStore;

use super::{FileDownload, Vault};

/// How long a new share link stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareExpiry {
    /// The configured default expiry window
    Default,
    /// No expiry at all
    Never,
    /// A fixed number of days from now
    Days(i64),
}

/// Parameters for creating a share link
pub struct CreateShare<'a> {
    pub file_id: &'a str,
    pub expiry: ShareExpiry,
    pub max_downloads: Option<i64>,
    pub password: Option<&'a str>,
    pub recipient: Option<&'a str>,
    pub notify: bool,
}

impl Vault {
    /// Create a share link for a file the user owns
    pub async fn create_share(&self, user_id: &str, request: &CreateShare<'_>) -> Result<Share> {
        let file = FileRepository::new(self.db())
            .get(request.file_id)
            .await?
            .filter(|f| f.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound(format!("File not found: {}", request.file_id)))?;

        let expires_at = match request.expiry {
            ShareExpiry::Default => {
                Some(Utc::now() + Duration::days(self.config().limits.default_share_expiry_days))
            }
            ShareExpiry::Never => None,
            ShareExpiry::Days(days) => Some(Utc::now() + Duration::days(days)),
        };
        let password_hash = request.password.map(password::hash_password);
        let token = generate_token();

        let share = ShareRepository::new(self.db())
            .create(&NewShare {
                token: &token,
                file_id: &file.id,
                user_id,
                expires_at,
                max_downloads: request.max_downloads,
                password_hash: password_hash.as_deref(),
            })
            .await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Share,
                    ActivityTarget::Share,
                    &share.id,
                )
                .with_details(json!({
                    "file": file.original_name,
                    "token": share.token,
                })),
            )
            .await?;

        if request.notify {
            let sender_name = UserRepository::new(self.db())
                .get(user_id)
                .await?
                .map(|u| u.username)
                .unwrap_or_else(|| user_id.to_string());

            let notice = ShareNotice {
                token: share.token.clone(),
                file_name: file.original_name.clone(),
                sender_name,
                recipient: request.recipient.map(str::to_string),
                expires_at: share.expires_at,
                password_protected: share.password_hash.is_some(),
            };
            if let Err(e) = self.notifier().share_created(&notice).await {
                tracing::warn!(token = %share.token, error = %e, "Share notification failed");
            }
        }

        tracing::info!(token = %share.token, file = %file.id, "Created share link");
        Ok(share)
    }

    /// Access a share link: validate, claim a download slot, decrypt.
    ///
    /// A wrong password never touches the counter. The slot claim is a
    /// guarded UPDATE, so two concurrent accesses of a one-download share
    /// admit exactly one winner; the loser is told which state refused it.
    pub async fn access_share(
        &self,
        token: &str,
        supplied_password: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FileDownload> {
        let repo = ShareRepository::new(self.db());
        let share = repo
            .get_by_token(token)
            .await?
            .ok_or(ShareAccessError::NotFound)?;

        match share.state(now) {
            ShareState::Active => {}
            ShareState::Expired => return Err(ShareAccessError::Expired.into()),
            ShareState::Exhausted => return Err(ShareAccessError::Exhausted.into()),
            ShareState::Revoked => return Err(ShareAccessError::Revoked.into()),
        }

        if !share.check_password(supplied_password) {
            return Err(ShareAccessError::WrongPassword.into());
        }

        if !repo.try_consume(&share.id, now).await? {
            // Lost the slot to a concurrent access or state flip; report
            // whatever refused the claim
            let fresh = repo
                .get_by_token(token)
                .await?
                .ok_or(ShareAccessError::NotFound)?;
            return Err(match fresh.state(now) {
                ShareState::Expired => ShareAccessError::Expired,
                ShareState::Revoked => ShareAccessError::Revoked,
                ShareState::Exhausted | ShareState::Active => ShareAccessError::Exhausted,
            }
            .into());
        }

        let file = FileRepository::new(self.db())
            .get(&share.file_id)
            .await?
            .ok_or_else(|| {
                VaultError::Internal(format!("Share {} references a missing file", share.id))
            })?;

        let ciphertext = self.blobs().get(&file.storage_name).await?;
        let key = FileKey::from_slice(&file.encryption_key)?;
        let nonce = FileNonce::from_slice(&file.encryption_nonce)?;
        let content = crypto::decrypt(&ciphertext, &key, &nonce)?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    &share.user_id,
                    ActivityAction::Download,
                    ActivityTarget::Share,
                    &share.id,
                )
                .with_details(json!({
                    "file": file.original_name,
                    "token": share.token,
                })),
            )
            .await?;

        tracing::info!(token = %share.token, file = %file.id, "Share download served");
        Ok(FileDownload {
            file_name: file.original_name,
            mime_type: file.mime_type,
            content,
            inline: false,
        })
    }

    /// Revoke a share link. Idempotent: revoking again changes nothing.
    pub async fn revoke_share(&self, user_id: &str, token: &str) -> Result<Share> {
        let repo = ShareRepository::new(self.db());
        let share = repo
            .get_by_token(token)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(ShareAccessError::NotFound)?;

        if share.revoked_at.is_none() {
            repo.revoke(token, Utc::now()).await?;

            ActivityRepository::new(self.db())
                .record(
                    &NewActivity::new(
                        user_id,
                        ActivityAction::Revoke,
                        ActivityTarget::Share,
                        &share.id,
                    )
                    .with_details(json!({"token": share.token})),
                )
                .await?;

            tracing::info!(token = %token, "Share link revoked");
        }

        repo.get_by_token(token)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch revoked share".to_string()))
    }

    /// Every share link the user has created, newest first
    pub async fn list_shares(&self, user_id: &str) -> Result<Vec<Share>> {
        ShareRepository::new(self.db()).list_for_user(user_id).await
    }

    /// Share links on one file the user owns
    pub async fn file_shares(&self, user_id: &str, file_id: &str) -> Result<Vec<Share>> {
        FileRepository::new(self.db())
            .get(file_id)
            .await?
            .filter(|f| f.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound(format!("File not found: {file_id}")))?;

        ShareRepository::new(self.db()).list_for_file(file_id).await
    }
}
