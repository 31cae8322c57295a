//! File and version-chain database operations
//!
//! A version chain is a linked list of file rows: `parent_id` points at the
//! version a row superseded, `version` counts up from 1, and exactly one row
//! per chain has `is_current = 1`. Superseding happens inside one
//! transaction with a guarded flip, so two concurrent writers cannot both
//! take the same head.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, VaultError};

use super::timestamp_column;

/// One stored file version
#[derive(Debug, Clone, Serialize)]
pub struct File {
    pub id: String,
    /// Opaque blob name, unique across the store
    pub storage_name: String,
    /// Display name the user uploaded under
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub encryption_key: Vec<u8>,
    #[serde(skip_serializing)]
    pub encryption_nonce: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
    /// Version this row superseded; None for the first version
    pub parent_id: Option<String>,
    pub version: i64,
    pub is_current: bool,
    pub folder_id: Option<String>,
    pub description: Option<String>,
}

impl FromRow<'_, SqliteRow> for File {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            storage_name: row.try_get("storage_name")?,
            original_name: row.try_get("original_name")?,
            file_size: row.try_get("file_size")?,
            mime_type: row.try_get("mime_type")?,
            user_id: row.try_get("user_id")?,
            encryption_key: row.try_get("encryption_key")?,
            encryption_nonce: row.try_get("encryption_nonce")?,
            uploaded_at: timestamp_column(row, "uploaded_at")?,
            parent_id: row.try_get("parent_id")?,
            version: row.try_get("version")?,
            is_current: row.try_get("is_current")?,
            folder_id: row.try_get("folder_id")?,
            description: row.try_get("description")?,
        })
    }
}

/// Fields for inserting a new file version
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub storage_name: &'a str,
    pub original_name: &'a str,
    pub file_size: i64,
    pub mime_type: &'a str,
    pub user_id: &'a str,
    pub encryption_key: &'a [u8],
    pub encryption_nonce: &'a [u8],
    pub folder_id: Option<&'a str>,
    pub description: Option<&'a str>,
}

const FILE_COLUMNS: &str = "id, storage_name, original_name, file_size, mime_type, user_id, \
     encryption_key, encryption_nonce, uploaded_at, parent_id, version, is_current, \
     folder_id, description";

/// Resolves the full chain of the bound file id: walk `parent_id` links up
/// to the root, then collect everything below the root. UNION keeps the
/// walk finite even against corrupted links.
const CHAIN_CTE: &str = r#"
WITH RECURSIVE
  up(id, parent_id) AS (
    SELECT id, parent_id FROM files WHERE id = ?
    UNION
    SELECT f.id, f.parent_id FROM files f JOIN up ON f.id = up.parent_id
  ),
  chain(id) AS (
    SELECT id FROM up WHERE parent_id IS NULL
    UNION
    SELECT f.id FROM files f JOIN chain ON f.parent_id = chain.id
  )
"#;

/// File repository
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the first version of a new chain
    pub async fn create(&self, data: &NewFile<'_>) -> Result<File> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO files (id, storage_name, original_name, file_size, mime_type, user_id,
                               encryption_key, encryption_nonce, uploaded_at, parent_id,
                               version, is_current, folder_id, description)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 1, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(data.storage_name)
        .bind(data.original_name)
        .bind(data.file_size)
        .bind(data.mime_type)
        .bind(data.user_id)
        .bind(data.encryption_key)
        .bind(data.encryption_nonce)
        .bind(now)
        .bind(data.folder_id)
        .bind(data.description)
        .execute(self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch created file".to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(file)
    }

    /// Record a new version on top of `head_id` and retire the old head,
    /// all in one transaction.
    ///
    /// The flip is guarded on `is_current = 1`: if another writer already
    /// superseded the same head, zero rows flip and the whole transaction
    /// rolls back with [`VaultError::VersionConflict`].
    pub async fn supersede(&self, head_id: &str, data: &NewFile<'_>) -> Result<File> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query("UPDATE files SET is_current = 0 WHERE id = ? AND is_current = 1")
            .bind(head_id)
            .execute(&mut *tx)
            .await?;

        if flipped.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM files WHERE id = ?")
                .bind(head_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            return Err(if exists {
                VaultError::VersionConflict(head_id.to_string())
            } else {
                VaultError::NotFound(format!("File not found: {head_id}"))
            });
        }

        let head = sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(head_id)
        .fetch_one(&mut *tx)
        .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO files (id, storage_name, original_name, file_size, mime_type, user_id,
                               encryption_key, encryption_nonce, uploaded_at, parent_id,
                               version, is_current, folder_id, description)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(data.storage_name)
        .bind(data.original_name)
        .bind(data.file_size)
        .bind(data.mime_type)
        .bind(data.user_id)
        .bind(data.encryption_key)
        .bind(data.encryption_nonce)
        .bind(now)
        .bind(head_id)
        .bind(head.version + 1)
        .bind(&head.folder_id)
        .bind(data.description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            file_id = %id,
            parent_id = %head_id,
            version = head.version + 1,
            "recorded new file version"
        );

        self.get(&id)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch created version".to_string()))
    }

    /// All members of the chain containing `file_id`, newest version first.
    /// Empty when the file does not exist.
    pub async fn chain_members(&self, file_id: &str) -> Result<Vec<File>> {
        let members = sqlx::query_as::<_, File>(&format!(
            "{CHAIN_CTE}
             SELECT {FILE_COLUMNS} FROM files
             WHERE id IN (SELECT id FROM chain)
             ORDER BY version DESC"
        ))
        .bind(file_id)
        .fetch_all(self.pool)
        .await?;

        Ok(members)
    }

    /// The unique current member of the chain containing `file_id`.
    ///
    /// Zero or several current members means the stored chain is corrupt
    /// and surfaces as [`VaultError::ChainInvariant`].
    pub async fn current_of_chain(&self, file_id: &str) -> Result<File> {
        if self.get(file_id).await?.is_none() {
            return Err(VaultError::NotFound(format!("File not found: {file_id}")));
        }

        let mut currents = sqlx::query_as::<_, File>(&format!(
            "{CHAIN_CTE}
             SELECT {FILE_COLUMNS} FROM files
             WHERE id IN (SELECT id FROM chain) AND is_current = 1"
        ))
        .bind(file_id)
        .fetch_all(self.pool)
        .await?;

        if currents.len() != 1 {
            return Err(VaultError::ChainInvariant {
                file_id: file_id.to_string(),
                current_count: currents.len() as i64,
            });
        }
        Ok(currents.remove(0))
    }

    /// Delete the whole chain containing `file_id` and return the deleted
    /// members so the caller can drop blobs and release quota. Shares on
    /// any member go with it through the foreign key cascade.
    pub async fn delete_chain(&self, file_id: &str) -> Result<Vec<File>> {
        let members = self.chain_members(file_id).await?;

        let Some(root) = members.iter().find(|f| f.parent_id.is_none()) else {
            return Err(if self.get(file_id).await?.is_some() {
                VaultError::Internal(format!("Chain of file {file_id} has no root"))
            } else {
                VaultError::NotFound(format!("File not found: {file_id}"))
            });
        };

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(&root.id)
            .execute(self.pool)
            .await?;

        tracing::info!(
            file_id = %file_id,
            versions = members.len(),
            "deleted version chain"
        );

        Ok(members)
    }

    /// Current files of a user inside one folder (`None` = top level)
    pub async fn list_folder(&self, user_id: &str, folder_id: Option<&str>) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE user_id = ? AND is_current = 1 AND folder_id IS ?
             ORDER BY original_name ASC"
        ))
        .bind(user_id)
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;

        Ok(files)
    }

    /// Case-insensitive display-name search over a user's current files
    pub async fn search(&self, user_id: &str, query: &str) -> Result<Vec<File>> {
        let pattern = format!(
            "%{}%",
            query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );

        let files = sqlx::query_as::<_, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE user_id = ? AND is_current = 1 AND original_name LIKE ? ESCAPE '\\'
             ORDER BY uploaded_at DESC"
        ))
        .bind(user_id)
        .bind(&pattern)
        .fetch_all(self.pool)
        .await?;

        Ok(files)
    }
}
