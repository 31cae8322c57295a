//! User account database operations

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::password;

use super::timestamp_column;

/// User record
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    /// Quota in bytes
    pub storage_quota: i64,
    /// Bytes currently attributed to this user's file versions
    pub storage_used: i64,
}

impl User {
    /// Whether `additional` bytes would still fit under the quota.
    /// Enforcement is the caller's policy; this is just the arithmetic.
    pub fn has_capacity(&self, additional: i64) -> bool {
        self.storage_used.saturating_add(additional) <= self.storage_quota
    }

    pub fn check_password(&self, supplied: &str) -> bool {
        password::verify_password(supplied, &self.password_hash)
    }
}

impl FromRow<'_, SqliteRow> for User {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: timestamp_column(row, "created_at")?,
            storage_quota: row.try_get("storage_quota")?,
            storage_used: row.try_get("storage_used")?,
        })
    }
}

/// User repository
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. The password goes through the verifier, never stored
    /// as given.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        storage_quota: i64,
    ) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let password_hash = password::hash_password(password);
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, storage_quota, storage_used)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(now)
        .bind(storage_quota)
        .execute(self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch created user".to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, storage_quota, storage_used
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, storage_quota, storage_used
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Attribute `bytes` more storage to a user
    pub async fn add_storage_used(&self, id: &str, bytes: i64) -> Result<()> {
        sqlx::query("UPDATE users SET storage_used = storage_used + ? WHERE id = ?")
            .bind(bytes)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Give storage back, clamped at zero
    pub async fn release_storage(&self, id: &str, bytes: i64) -> Result<()> {
        sqlx::query("UPDATE users SET storage_used = MAX(0, storage_used - ?) WHERE id = ?")
            .bind(bytes)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}
