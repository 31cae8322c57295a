//! Activity log records
//!
//! Every mutating operation leaves a trail entry. Action and target kinds
//! are closed sets: an out-of-vocabulary tag cannot be constructed in code
//! and is rejected when read back from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored tag that is not part of the closed vocabulary
#[derive(Debug, thiserror::Error)]
#[error("unknown activity tag {0:?}")]
pub struct UnknownActivityTag(pub String);

/// What a user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Upload,
    Download,
    Share,
    Revoke,
    Login,
    Logout,
    Register,
    Preview,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Upload => "UPLOAD",
            Self::Download => "DOWNLOAD",
            Self::Share => "SHARE",
            Self::Revoke => "REVOKE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Register => "REGISTER",
            Self::Preview => "PREVIEW",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, UnknownActivityTag> {
        match tag {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "UPLOAD" => Ok(Self::Upload),
            "DOWNLOAD" => Ok(Self::Download),
            "SHARE" => Ok(Self::Share),
            "REVOKE" => Ok(Self::Revoke),
            "LOGIN" => Ok(Self::Login),
            "LOGOUT" => Ok(Self::Logout),
            "REGISTER" => Ok(Self::Register),
            "PREVIEW" => Ok(Self::Preview),
            other => Err(UnknownActivityTag(other.to_string())),
        }
    }

    /// Past-tense phrase for activity feeds
    pub fn description(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::Upload => "uploaded",
            Self::Download => "downloaded",
            Self::Share => "shared",
            Self::Revoke => "revoked share for",
            Self::Login => "logged in",
            Self::Logout => "logged out",
            Self::Register => "registered",
            Self::Preview => "previewed",
        }
    }
}

/// What the action was aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityTarget {
    File,
    Folder,
    Share,
    User,
    System,
}

impl ActivityTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Folder => "FOLDER",
            Self::Share => "SHARE",
            Self::User => "USER",
            Self::System => "SYSTEM",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, UnknownActivityTag> {
        match tag {
            "FILE" => Ok(Self::File),
            "FOLDER" => Ok(Self::Folder),
            "SHARE" => Ok(Self::Share),
            "USER" => Ok(Self::User),
            "SYSTEM" => Ok(Self::System),
            other => Err(UnknownActivityTag(other.to_string())),
        }
    }
}

/// One stored trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub action: ActivityAction,
    pub target: ActivityTarget,
    pub target_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Option<serde_json::Value>,
}

/// Entry waiting to be recorded
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: String,
    pub action: ActivityAction,
    pub target: ActivityTarget,
    pub target_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(
        user_id: impl Into<String>,
        action: ActivityAction,
        target: ActivityTarget,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            target,
            target_id: target_id.into(),
            ip_address: None,
            user_agent: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
