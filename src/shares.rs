//! Share links and their validity state machine
//!
//! A share's validity is never stored; it is a pure function of the row and
//! the clock. `Expired`, `Exhausted`, and `Revoked` are terminal: time only
//! moves forward, the counter only climbs, and revocation is never undone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::password;

/// Why a share access was refused. Callers can tell the outcomes apart;
/// nothing else about the share is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShareAccessError {
    #[error("share not found")]
    NotFound,
    #[error("share link has expired")]
    Expired,
    #[error("share download limit reached")]
    Exhausted,
    #[error("share link was revoked")]
    Revoked,
    #[error("share password missing or wrong")]
    WrongPassword,
}

/// A revocable link to one file version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    /// Opaque unguessable capability, 32 hex chars
    pub token: String,
    pub file_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// No expiry when absent
    pub expires_at: Option<DateTime<Utc>>,
    /// No download cap when absent
    pub max_downloads: Option<i64>,
    pub download_count: i64,
    /// Password verifier; absent means no password gate
    pub password_hash: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Where a share sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareState {
    /// Usable right now
    Active,
    /// `now` is at or past `expires_at`
    Expired,
    /// The download cap has been consumed
    Exhausted,
    /// The owner pulled the link
    Revoked,
}

impl Share {
    /// Classify this share at a point in time.
    ///
    /// Precedence when several conditions hold: revocation, then expiry,
    /// then the download cap.
    pub fn state(&self, now: DateTime<Utc>) -> ShareState {
        if self.revoked_at.is_some() {
            return ShareState::Revoked;
        }
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return ShareState::Expired;
            }
        }
        if let Some(max) = self.max_downloads {
            if self.download_count >= max {
                return ShareState::Exhausted;
            }
        }
        ShareState::Active
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == ShareState::Active
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// A share without a verifier accepts any supplied password, including
    /// none at all.
    pub fn check_password(&self, supplied: Option<&str>) -> bool {
        match &self.password_hash {
            None => true,
            Some(stored) => match supplied {
                Some(password) => password::verify_password(password, stored),
                None => false,
            },
        }
    }
}

/// Mint a new share token: 32 hex chars of UUIDv4
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
