//! Folder tree database operations
//!
//! Folders form a tree through `parent_id`. The tree stays acyclic because
//! every re-parent walks the target's ancestry first and refuses to create
//! a loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, VaultError};

use super::timestamp_column;

/// Hard ceiling on folder nesting; deeper trees indicate corrupted links
pub const MAX_FOLDER_DEPTH: usize = 64;

/// Folder tree failures callers can act on
#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    #[error("folder not found: {0}")]
    NotFound(String),
    /// Re-parenting would make the folder its own ancestor
    #[error("moving folder {folder_id} under {target_id} would create a cycle")]
    Cycle { folder_id: String, target_id: String },
    #[error("folder tree exceeds {0} levels")]
    DepthExceeded(usize),
}

/// Folder record
#[derive(Debug, Clone, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Folder {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            user_id: row.try_get("user_id")?,
            parent_id: row.try_get("parent_id")?,
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        })
    }
}

const FOLDER_COLUMNS: &str = "id, name, description, user_id, parent_id, created_at, updated_at";

/// Folder repository
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<Folder> {
        if let Some(parent) = parent_id {
            if self.get(parent).await?.is_none() {
                return Err(FolderError::NotFound(parent.to_string()).into());
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO folders (id, name, description, user_id, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(user_id)
        .bind(parent_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch created folder".to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(folder)
    }

    /// Re-parent a folder (`None` moves it to the top level).
    ///
    /// Rejected with [`FolderError::Cycle`] when the target sits inside the
    /// folder being moved, itself included.
    pub async fn move_folder(&self, id: &str, new_parent_id: Option<&str>) -> Result<Folder> {
        if self.get(id).await?.is_none() {
            return Err(FolderError::NotFound(id.to_string()).into());
        }

        if let Some(target_id) = new_parent_id {
            if target_id == id {
                return Err(FolderError::Cycle {
                    folder_id: id.to_string(),
                    target_id: target_id.to_string(),
                }
                .into());
            }

            let target = self
                .get(target_id)
                .await?
                .ok_or_else(|| FolderError::NotFound(target_id.to_string()))?;

            let mut ancestor = target.parent_id.clone();
            let mut depth = 0;
            while let Some(ancestor_id) = ancestor {
                if ancestor_id == id {
                    return Err(FolderError::Cycle {
                        folder_id: id.to_string(),
                        target_id: target_id.to_string(),
                    }
                    .into());
                }
                depth += 1;
                if depth > MAX_FOLDER_DEPTH {
                    return Err(FolderError::DepthExceeded(MAX_FOLDER_DEPTH).into());
                }
                ancestor = self
                    .get(&ancestor_id)
                    .await?
                    .ok_or_else(|| FolderError::NotFound(ancestor_id.clone()))?
                    .parent_id;
            }
        }

        sqlx::query("UPDATE folders SET parent_id = ?, updated_at = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(self.pool)
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| VaultError::Internal("Failed to fetch moved folder".to_string()))
    }

    /// Full path of a folder from the root, like `/projects/2024/reports`
    pub async fn path(&self, id: &str) -> Result<String> {
        let folder = self
            .get(id)
            .await?
            .ok_or_else(|| FolderError::NotFound(id.to_string()))?;

        let mut segments = vec![folder.name];
        let mut parent = folder.parent_id;
        let mut depth = 0;

        while let Some(parent_id) = parent {
            depth += 1;
            if depth > MAX_FOLDER_DEPTH {
                return Err(FolderError::DepthExceeded(MAX_FOLDER_DEPTH).into());
            }
            let ancestor = self
                .get(&parent_id)
                .await?
                .ok_or_else(|| FolderError::NotFound(parent_id.clone()))?;
            segments.push(ancestor.name);
            parent = ancestor.parent_id;
        }

        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Direct subfolders of `parent_id` (`None` = top level) for a user
    pub async fn list_children(
        &self,
        user_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE user_id = ? AND parent_id IS ?
             ORDER BY name ASC"
        ))
        .bind(user_id)
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(folders)
    }

    /// Delete a folder. Subfolders cascade away; files inside drop back to
    /// the top level through the foreign key.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn path_resolution_walks_to_the_root() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let repo = FolderRepository::new(&pool);

        let a = repo.create(&user.id, "projects", None, None).await.unwrap();
        let b = repo.create(&user.id, "2024", None, Some(&a.id)).await.unwrap();
        let c = repo.create(&user.id, "reports", None, Some(&b.id)).await.unwrap();

        assert_eq!(repo.path(&a.id).await.unwrap(), "/projects");
        assert_eq!(repo.path(&c.id).await.unwrap(), "/projects/2024/reports");
    }

    #[tokio::test]
    async fn move_into_own_subtree_is_rejected() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let repo = FolderRepository::new(&pool);

        let a = repo.create(&user.id, "a", None, None).await.unwrap();
        let b = repo.create(&user.id, "b", None, Some(&a.id)).await.unwrap();
        let c = repo.create(&user.id, "c", None, Some(&b.id)).await.unwrap();

        // a under its own grandchild
        let err = repo.move_folder(&a.id, Some(&c.id)).await.unwrap_err();
        assert!(matches!(err, VaultError::Folder(FolderError::Cycle { .. })));

        // a under itself
        let err = repo.move_folder(&a.id, Some(&a.id)).await.unwrap_err();
        assert!(matches!(err, VaultError::Folder(FolderError::Cycle { .. })));

        // Tree unchanged
        assert_eq!(repo.path(&c.id).await.unwrap(), "/a/b/c");
    }

    #[tokio::test]
    async fn legal_moves_update_paths() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let repo = FolderRepository::new(&pool);

        let a = repo.create(&user.id, "a", None, None).await.unwrap();
        let b = repo.create(&user.id, "b", None, None).await.unwrap();
        let c = repo.create(&user.id, "c", None, Some(&b.id)).await.unwrap();

        repo.move_folder(&b.id, Some(&a.id)).await.unwrap();
        assert_eq!(repo.path(&c.id).await.unwrap(), "/a/b/c");

        repo.move_folder(&b.id, None).await.unwrap();
        assert_eq!(repo.path(&c.id).await.unwrap(), "/b/c");
    }

    #[tokio::test]
    async fn children_listing_is_scoped_to_parent() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let repo = FolderRepository::new(&pool);

        let a = repo.create(&user.id, "a", None, None).await.unwrap();
        repo.create(&user.id, "inner", None, Some(&a.id)).await.unwrap();
        repo.create(&user.id, "z", None, None).await.unwrap();

        let top = repo.list_children(&user.id, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "a");

        let inside = repo.list_children(&user.id, Some(&a.id)).await.unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].name, "inner");
    }

    #[tokio::test]
    async fn delete_cascades_subfolders_and_releases_files() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let folders = FolderRepository::new(&pool);
        let files = crate::db::FileRepository::new(&pool);

        let a = folders.create(&user.id, "a", None, None).await.unwrap();
        let b = folders.create(&user.id, "b", None, Some(&a.id)).await.unwrap();

        let filed = files
            .create(&crate::db::NewFile {
                storage_name: "s1",
                original_name: "doc.txt",
                file_size: 10,
                mime_type: "text/plain",
                user_id: &user.id,
                encryption_key: &[1u8; 32],
                encryption_nonce: &[2u8; 12],
                folder_id: Some(&b.id),
                description: None,
            })
            .await
            .unwrap();

        assert!(folders.delete(&a.id).await.unwrap());
        assert!(folders.get(&b.id).await.unwrap().is_none());

        // The file survives at the top level
        let survivor = files.get(&filed.id).await.unwrap().unwrap();
        assert_eq!(survivor.folder_id, None);
    }

    #[tokio::test]
    async fn missing_parent_is_reported_at_create() {
        let (_dir, pool) = testing::pool().await;
        let user = testing::seed_user(&pool, "ada").await;
        let repo = FolderRepository::new(&pool);

        let err = repo.create(&user.id, "x", None, Some("ghost")).await.unwrap_err();
        assert!(matches!(err, VaultError::Folder(FolderError::NotFound(_))));
    }
}
