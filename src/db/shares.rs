//! Share link database operations
//!
//! The table is the source of truth for download counting: consuming a
//! download happens through a single guarded `UPDATE`, so two concurrent
//! requests can never both claim the last slot of a capped link.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::shares::Share;

use super::{optional_timestamp_column, timestamp_column};

impl FromRow<'_, SqliteRow> for Share {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            file_id: row.try_get("file_id")?,
            user_id: row.try_get("user_id")?,
            created_at: timestamp_column(row, "created_at")?,
            expires_at: optional_timestamp_column(row, "expires_at")?,
            max_downloads: row.try_get("max_downloads")?,
            download_count: row.try_get("download_count")?,
            password_hash: row.try_get("password_hash")?,
            revoked_at: optional_timestamp_column(row, "revoked_at")?,
        })
    }
}

const SHARE_COLUMNS: &str = "id, token, file_id, user_id, created_at, expires_at, \
                             max_downloads, download_count, password_hash, revoked_at";

/// Parameters for creating a share link
pub struct NewShare<'a> {
    pub token: &'a str,
    pub file_id: &'a str,
    pub user_id: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<i64>,
    pub password_hash: Option<&'a str>,
}

/// Share repository
pub struct ShareRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShareRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, data: &NewShare<'_>) -> Result<Share> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO shares (id, token, file_id, user_id, created_at, expires_at,
                                max_downloads, download_count, password_hash, revoked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(data.token)
        .bind(data.file_id)
        .bind(data.user_id)
        .bind(now)
        .bind(data.expires_at.map(|at| at.timestamp()))
        .bind(data.max_downloads)
        .bind(data.password_hash)
        .execute(self.pool)
        .await?;

        self.get_by_token(data.token)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch created share".to_string()))
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<Share>> {
        let share = sqlx::query_as::<_, Share>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(share)
    }

    pub async fn list_for_file(&self, file_id: &str) -> Result<Vec<Share>> {
        let shares = sqlx::query_as::<_, Share>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE file_id = ? ORDER BY created_at DESC"
        ))
        .bind(file_id)
        .fetch_all(self.pool)
        .await?;

        Ok(shares)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Share>> {
        let shares = sqlx::query_as::<_, Share>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(shares)
    }

    /// Claim one download slot at `now`.
    ///
    /// The predicate re-proves every validity condition inside the `UPDATE`,
    /// so the counter only moves while the share is still live. Returns
    /// `false` when no slot was claimed; the caller re-reads the row to find
    /// out which condition failed.
    pub async fn try_consume(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shares
            SET download_count = download_count + 1
            WHERE id = ?
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > ?)
              AND (max_downloads IS NULL OR download_count < max_downloads)
            "#,
        )
        .bind(id)
        .bind(now.timestamp())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a share revoked. Returns `false` when the token is unknown or
    /// the share was already revoked.
    pub async fn revoke(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE shares SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(now.timestamp())
        .bind(token)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
