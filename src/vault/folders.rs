//! Folder tree and browsing operations

use serde::Serialize;
use serde_json::json;

use crate::activity::{ActivityAction, ActivityTarget, NewActivity};
use crate::db::{ActivityRepository, File, FileRepository, Folder, FolderError, FolderRepository};
use crate::error::Result;

use super::Vault;

/// Contents of one folder level: subfolders plus current file versions
#[derive(Debug, Serialize)]
pub struct FolderListing {
    pub folders: Vec<Folder>,
    pub files: Vec<File>,
}

impl Vault {
    pub async fn create_folder(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<Folder> {
        let repo = FolderRepository::new(self.db());
        if let Some(parent) = parent_id {
            self.owned_folder(user_id, parent).await?;
        }

        let folder = repo.create(user_id, name, description, parent_id).await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Create,
                    ActivityTarget::Folder,
                    &folder.id,
                )
                .with_details(json!({"name": folder.name})),
            )
            .await?;

        tracing::info!(folder = %folder.id, name = %folder.name, "Created folder");
        Ok(folder)
    }

    /// Re-parent a folder the user owns (`None` moves it to the top level)
    pub async fn move_folder(
        &self,
        user_id: &str,
        folder_id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<Folder> {
        self.owned_folder(user_id, folder_id).await?;
        if let Some(target) = new_parent_id {
            self.owned_folder(user_id, target).await?;
        }

        let moved = FolderRepository::new(self.db())
            .move_folder(folder_id, new_parent_id)
            .await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Update,
                    ActivityTarget::Folder,
                    &moved.id,
                )
                .with_details(json!({
                    "name": moved.name,
                    "parent": moved.parent_id,
                })),
            )
            .await?;

        tracing::info!(folder = %moved.id, "Moved folder");
        Ok(moved)
    }

    /// Full path of a folder the user owns, like `/projects/2024/reports`
    pub async fn folder_path(&self, user_id: &str, folder_id: &str) -> Result<String> {
        self.owned_folder(user_id, folder_id).await?;
        FolderRepository::new(self.db()).path(folder_id).await
    }

    /// List one folder level: subfolders and the current version of every
    /// file filed there. `None` browses the top level.
    pub async fn browse(&self, user_id: &str, folder_id: Option<&str>) -> Result<FolderListing> {
        if let Some(id) = folder_id {
            self.owned_folder(user_id, id).await?;
        }

        let folders = FolderRepository::new(self.db())
            .list_children(user_id, folder_id)
            .await?;
        let files = FileRepository::new(self.db())
            .list_folder(user_id, folder_id)
            .await?;

        Ok(FolderListing { folders, files })
    }

    /// Delete a folder. Subfolders go with it; files fall back to the top
    /// level and keep their version chains.
    pub async fn delete_folder(&self, user_id: &str, folder_id: &str) -> Result<()> {
        let folder = self.owned_folder(user_id, folder_id).await?;

        FolderRepository::new(self.db()).delete(folder_id).await?;

        ActivityRepository::new(self.db())
            .record(
                &NewActivity::new(
                    user_id,
                    ActivityAction::Delete,
                    ActivityTarget::Folder,
                    folder_id,
                )
                .with_details(json!({"name": folder.name})),
            )
            .await?;

        tracing::info!(folder = %folder_id, "Deleted folder");
        Ok(())
    }

    /// Case-insensitive name search over the user's current file versions
    pub async fn search_files(&self, user_id: &str, query: &str) -> Result<Vec<File>> {
        FileRepository::new(self.db()).search(user_id, query).await
    }

    /// Fetch a folder and require the user to own it. Foreign folders are
    /// indistinguishable from missing ones.
    async fn owned_folder(&self, user_id: &str, folder_id: &str) -> Result<Folder> {
        FolderRepository::new(self.db())
            .get(folder_id)
            .await?
            .filter(|f| f.user_id == user_id)
            .ok_or_else(|| FolderError::NotFound(folder_id.to_string()).into())
    }
}
