//! Error types for the sealbox core

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::chunks::ChunkAssemblyError;
use crate::crypto::{CryptoError, DecryptionError};
use crate::db::FolderError;
use crate::shares::ShareAccessError;
use crate::storage::BlobStoreError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, VaultError>;

/// Top-level error for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Share access refused: {0}")]
    ShareAccess(#[from] ShareAccessError),

    #[error("Chunk assembly failed: {0}")]
    ChunkAssembly(#[from] ChunkAssemblyError),

    /// Another writer superseded the same version first
    #[error("Version conflict: file {0} is no longer the current version")]
    VersionConflict(String),

    /// A chain holds zero or several current members. Should never happen;
    /// indicates corrupted data rather than a caller mistake.
    #[error("Version chain invariant violated for file {file_id}: {current_count} current members")]
    ChainInvariant { file_id: String, current_count: i64 },

    #[error("Decryption failed: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Folder error: {0}")]
    Folder(#[from] FolderError),

    #[error("Blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            VaultError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            VaultError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            VaultError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            VaultError::ShareAccess(e) => {
                let (status, error_type) = match e {
                    ShareAccessError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                    ShareAccessError::Expired => (StatusCode::GONE, "share_expired"),
                    ShareAccessError::Exhausted => (StatusCode::GONE, "share_exhausted"),
                    ShareAccessError::Revoked => (StatusCode::GONE, "share_revoked"),
                    ShareAccessError::WrongPassword => {
                        (StatusCode::UNAUTHORIZED, "wrong_password")
                    }
                };
                (status, error_type, e.to_string())
            }
            VaultError::ChunkAssembly(e) => match e {
                ChunkAssemblyError::Io(inner) => {
                    tracing::error!("Chunk IO error: {}", inner);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "chunk_error",
                        "Chunk storage error".to_string(),
                    )
                }
                _ => (StatusCode::BAD_REQUEST, "chunk_error", e.to_string()),
            },
            VaultError::VersionConflict(file_id) => (
                StatusCode::CONFLICT,
                "version_conflict",
                format!("File {} was updated concurrently", file_id),
            ),
            VaultError::ChainInvariant { file_id, .. } => {
                tracing::error!("Chain invariant violated: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    format!("Version chain for file {} is corrupted", file_id),
                )
            }
            VaultError::Decryption(_) => {
                tracing::error!("Decryption failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decryption_error",
                    "Stored content could not be decrypted".to_string(),
                )
            }
            VaultError::Crypto(e) => {
                tracing::error!("Crypto error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "crypto_error",
                    "Encryption error".to_string(),
                )
            }
            VaultError::Folder(e) => match e {
                FolderError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("Folder not found: {}", id),
                ),
                FolderError::Cycle { .. } => {
                    (StatusCode::BAD_REQUEST, "folder_cycle", e.to_string())
                }
                FolderError::DepthExceeded(_) => {
                    tracing::error!("Folder error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "Folder tree is corrupted".to_string(),
                    )
                }
            },
            VaultError::BlobStore(e) => match e {
                BlobStoreError::NotFound(name) => {
                    tracing::error!("Blob missing: {}", name);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        "Stored content is missing".to_string(),
                    )
                }
                BlobStoreError::AlreadyExists(_) => {
                    (StatusCode::CONFLICT, "storage_conflict", e.to_string())
                }
                BlobStoreError::InvalidName(_) => {
                    (StatusCode::BAD_REQUEST, "storage_error", e.to_string())
                }
                BlobStoreError::Io(inner) => {
                    tracing::error!("Blob store IO error: {}", inner);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        "Storage error".to_string(),
                    )
                }
            },
            VaultError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            VaultError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_access_statuses_stay_distinguishable() {
        let cases = [
            (ShareAccessError::NotFound, StatusCode::NOT_FOUND),
            (ShareAccessError::Expired, StatusCode::GONE),
            (ShareAccessError::Exhausted, StatusCode::GONE),
            (ShareAccessError::Revoked, StatusCode::GONE),
            (ShareAccessError::WrongPassword, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            let response = VaultError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn duplicate_chunk_maps_to_bad_request() {
        let err = VaultError::from(ChunkAssemblyError::DuplicateChunk(3));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn version_conflict_maps_to_conflict() {
        let err = VaultError::VersionConflict("f1".into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
