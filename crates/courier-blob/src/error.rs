//! Error types for the Blob service

use thiserror::Error;

/// Errors that can occur in the Blob service
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("S3 error: {0}")]
    S3(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Presign failed: {0}")]
    Presign(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}
