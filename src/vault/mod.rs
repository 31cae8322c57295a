//! Vault context and core operations
//!
//! `Vault` is the explicit context object every operation runs through:
//! configuration, database pool, blob store, and notification hook live
//! here and nowhere else. Binaries and tests construct one and pass it
//! around; there is no process-wide state.

mod download;
mod folders;
mod shares;
mod upload;
mod versions;

pub use download::FileDownload;
pub use folders::FolderListing;
pub use shares::{CreateShare, ShareExpiry};
pub use upload::UploadRequest;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::activity::{Activity, ActivityAction, ActivityTarget, NewActivity};
use crate::config::Config;
use crate::db::{self, ActivityRepository, User, UserRepository};
use crate::error::{Result, VaultError};
use crate::notify::{LogNotifier, ShareNotifier};
use crate::storage::{BlobStore, LocalBlobStore};

/// Shared vault context
#[derive(Clone)]
pub struct Vault {
    inner: Arc<VaultInner>,
}

struct VaultInner {
    config: Config,
    db: SqlitePool,
    blobs: Box<dyn BlobStore>,
    notifier: Box<dyn ShareNotifier>,
}

impl Vault {
    /// Wire a vault from pre-built parts
    pub fn new(
        config: Config,
        db: SqlitePool,
        blobs: Box<dyn BlobStore>,
        notifier: Box<dyn ShareNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(VaultInner {
                config,
                db,
                blobs,
                notifier,
            }),
        }
    }

    /// Open the vault described by `config`: connect the database, prepare
    /// the storage directories, and fall back to the logging notifier.
    pub async fn open(config: Config) -> Result<Self> {
        let db = db::create_pool(&config.database.url).await?;
        let blobs = LocalBlobStore::open(&config.storage.root)
            .await
            .map_err(VaultError::BlobStore)?;
        tokio::fs::create_dir_all(&config.storage.temp_dir).await?;

        Ok(Self::new(config, db, Box::new(blobs), Box::new(LogNotifier)))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the blob store
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    /// Get the share notification hook
    pub fn notifier(&self) -> &dyn ShareNotifier {
        self.inner.notifier.as_ref()
    }

    /// Register a user account with the default storage quota
    pub async fn register_user(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let repo = UserRepository::new(self.db());
        let quota = self.config().limits.default_storage_quota;

        let user = match repo.create(username, email, password, quota).await {
            Ok(user) => user,
            Err(VaultError::Database(e))
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                return Err(VaultError::BadRequest(
                    "Username or email is already taken".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        ActivityRepository::new(self.db())
            .record(&NewActivity::new(
                &user.id,
                ActivityAction::Register,
                ActivityTarget::User,
                &user.id,
            ))
            .await?;

        tracing::info!(user = %user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Most recent activity entries for a user, newest first
    pub async fn recent_activity(&self, user_id: &str, limit: i64) -> Result<Vec<Activity>> {
        ActivityRepository::new(self.db())
            .recent_for_user(user_id, limit)
            .await
    }
}
