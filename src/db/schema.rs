//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- User accounts with storage accounting
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    storage_quota INTEGER NOT NULL,
    storage_used INTEGER NOT NULL DEFAULT 0
);

-- Folder tree. Re-parenting walks the ancestry first, keeping it acyclic.
CREATE TABLE IF NOT EXISTS folders (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id TEXT REFERENCES folders(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_folders_user ON folders(user_id);
CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);

-- File versions. parent_id links a version to the one it superseded;
-- exactly one row per chain carries is_current = 1.
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    storage_name TEXT NOT NULL UNIQUE,
    original_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    encryption_key BLOB NOT NULL,
    encryption_nonce BLOB NOT NULL,
    uploaded_at INTEGER NOT NULL,
    parent_id TEXT REFERENCES files(id) ON DELETE CASCADE,
    version INTEGER NOT NULL DEFAULT 1,
    is_current INTEGER NOT NULL DEFAULT 1,
    folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_files_user ON files(user_id);
CREATE INDEX IF NOT EXISTS idx_files_parent ON files(parent_id);
CREATE INDEX IF NOT EXISTS idx_files_folder ON files(folder_id);
CREATE INDEX IF NOT EXISTS idx_files_user_current ON files(user_id, is_current);

-- Share links. Validity is computed from these columns, never stored.
CREATE TABLE IF NOT EXISTS shares (
    id TEXT PRIMARY KEY,
    token TEXT NOT NULL UNIQUE,
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    max_downloads INTEGER,
    download_count INTEGER NOT NULL DEFAULT 0,
    password_hash TEXT,
    revoked_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_shares_file ON shares(file_id);
CREATE INDEX IF NOT EXISTS idx_shares_user ON shares(user_id);

-- Activity trail
CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    action TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    timestamp INTEGER NOT NULL,
    details TEXT
);

CREATE INDEX IF NOT EXISTS idx_activities_user_time ON activities(user_id, timestamp);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_initialization_is_idempotent() {
        let (_dir, pool) = crate::db::testing::pool().await;
        // create_pool already ran it once
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let (_dir, pool) = crate::db::testing::pool().await;

        let result = sqlx::query(
            "INSERT INTO files (id, storage_name, original_name, file_size, mime_type,
                                user_id, encryption_key, encryption_nonce, uploaded_at)
             VALUES ('f1', 's1', 'o1', 1, 'text/plain', 'missing-user', x'00', x'00', 0)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }
}
