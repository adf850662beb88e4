//! Error types for the blob vault service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use file_blob_cache::CacheError;
use serde_json::json;
use std::fmt;
use tiered_storage::{ErrorKind, StorageError};

/// Startup failures
#[derive(Debug)]
pub enum VaultError {
    Config(String),
    Cache(CacheError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::Config(msg) => write!(f, "Configuration error: {}", msg),
            VaultError::Cache(err) => write!(f, "Cache error: {}", err),
            VaultError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VaultError::Cache(err) => Some(err),
            VaultError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<CacheError> for VaultError {
    fn from(err: CacheError) -> Self {
        VaultError::Cache(err)
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for VaultError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        VaultError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Request failures, converted to JSON error responses
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Storage(StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Storage(e) => match e.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, e.to_string()),
                kind => {
                    tracing::error!(error = %e, ?kind, "Storage operation failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, advisory(kind).into())
                }
            },
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

/// Client-facing message for failures whose detail stays in the logs
fn advisory(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RemoteUnavailable | ErrorKind::Timeout => {
            "Remote storage is unavailable, try again later"
        }
        ErrorKind::Crypto => "Stored data could not be decrypted",
        _ => "Internal server error",
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e)
    }
}
