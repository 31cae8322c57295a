//! Activity trail database operations

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::activity::{Activity, ActivityAction, ActivityTarget, NewActivity};
use crate::error::{Result, VaultError};

use super::timestamp_column;

impl FromRow<'_, SqliteRow> for Activity {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let action: String = row.try_get("action")?;
        let action = ActivityAction::parse(&action).map_err(|e| sqlx::Error::ColumnDecode {
            index: "action".to_string(),
            source: Box::new(e),
        })?;

        let target: String = row.try_get("target_type")?;
        let target = ActivityTarget::parse(&target).map_err(|e| sqlx::Error::ColumnDecode {
            index: "target_type".to_string(),
            source: Box::new(e),
        })?;

        let details: Option<String> = row.try_get("details")?;
        let details = details
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "details".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            action,
            target,
            target_id: row.try_get("target_id")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            timestamp: timestamp_column(row, "timestamp")?,
            details,
        })
    }
}

const ACTIVITY_COLUMNS: &str =
    "id, user_id, action, target_type, target_id, ip_address, user_agent, timestamp, details";

/// Activity repository
pub struct ActivityRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActivityRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: &NewActivity) -> Result<Activity> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| VaultError::Internal(format!("Failed to encode activity details: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO activities (id, user_id, action, target_type, target_id,
                                    ip_address, user_agent, timestamp, details)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.target.as_str())
        .bind(&entry.target_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(now)
        .bind(details)
        .execute(self.pool)
        .await?;

        let activity = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?"
        ))
        .bind(&id)
        .fetch_optional(self.pool)
        .await?;

        activity.ok_or_else(|| VaultError::Internal("Failed to fetch recorded activity".to_string()))
    }

    /// Most recent entries for a user, newest first
    pub async fn recent_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE user_id = ?
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(activities)
    }
}
