//! Configuration management for the vault

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding encrypted blobs
    pub root: PathBuf,
    /// Scratch directory for chunked uploads
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted plaintext upload
    pub max_upload_bytes: u64,
    /// Chunk size clients should slice uploads into
    pub chunk_size_bytes: u64,
    /// Expiry applied to new share links when none is given
    pub default_share_expiry_days: i64,
    /// Storage quota for new accounts
    pub default_storage_quota: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                root: PathBuf::from("uploads"),
                temp_dir: PathBuf::from("temp"),
            },
            database: DatabaseConfig {
                url: "sqlite:./vault.db".to_string(),
            },
            limits: LimitsConfig {
                max_upload_bytes: 100 * 1024 * 1024,
                chunk_size_bytes: 1024 * 1024,
                default_share_expiry_days: 7,
                default_storage_quota: 10 * 1024 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    /// Read configuration from the process environment, loading `.env`
    /// first. Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Config::default().limits;

        Config {
            storage: StorageConfig {
                root: env::var("VAULT_STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("uploads")),
                temp_dir: env::var("VAULT_TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("temp")),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./vault.db".to_string()),
            },
            limits: LimitsConfig {
                max_upload_bytes: env::var("VAULT_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_upload_bytes),
                chunk_size_bytes: env::var("VAULT_CHUNK_SIZE_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.chunk_size_bytes),
                default_share_expiry_days: env::var("VAULT_SHARE_EXPIRY_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.default_share_expiry_days),
                default_storage_quota: env::var("VAULT_STORAGE_QUOTA")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.default_storage_quota),
            },
        }
    }
}
