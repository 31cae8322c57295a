//! Database module for SQLite persistence
//!
//! Holds the user, folder, file, share, and activity tables. Timestamps are
//! stored as INTEGER Unix seconds so expiry and ordering comparisons can run
//! inside SQL.

mod activity;
mod files;
mod folders;
mod schema;
mod shares;
mod users;

pub use activity::*;
pub use files::*;
pub use folders::*;
pub use schema::*;
pub use shares::*;
pub use users::*;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    column: &str,
) -> std::result::Result<DateTime<Utc>, sqlx::Error> {
    let secs: i64 = row.try_get(column)?;
    decode_timestamp(column, secs)
}

pub(crate) fn optional_timestamp_column(
    row: &SqliteRow,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, sqlx::Error> {
    let secs: Option<i64> = row.try_get(column)?;
    secs.map(|s| decode_timestamp(column, s)).transpose()
}

fn decode_timestamp(column: &str, secs: i64) -> std::result::Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("timestamp {secs} out of range").into(),
    })
}
