//! Error types for tiered storage
//!
//! Underlying cache, remote and crypto errors are wrapped with the
//! operation and object name that produced them.

use blob_envelope::EnvelopeError;
use file_blob_cache::CacheError;
use object_store_client::ObjectStoreError;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum StorageError {
    InvalidName(String),
    InvalidTags(String),
    /// The object is in neither tier
    NotFound(String),
    Cache {
        op: &'static str,
        name: String,
        source: CacheError,
    },
    Remote {
        op: &'static str,
        name: String,
        source: ObjectStoreError,
    },
    Crypto {
        name: String,
        source: EnvelopeError,
    },
    Timeout {
        op: &'static str,
        name: String,
        after: Duration,
    },
    /// Fetching or opening the remote copy failed on a cache miss
    DownloadFailed {
        name: String,
        source: Box<StorageError>,
    },
}

/// Coarse classification for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Crypto,
    RemoteUnavailable,
    Timeout,
    Io,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_) | Self::InvalidTags(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cache { source, .. } => match source {
                CacheError::InvalidName(_) => ErrorKind::InvalidInput,
                CacheError::Io(_) => ErrorKind::Io,
            },
            Self::Remote { source, .. } => match source {
                ObjectStoreError::NotFound(_) => ErrorKind::NotFound,
                ObjectStoreError::InvalidName(_) | ObjectStoreError::InvalidTags(_) => {
                    ErrorKind::InvalidInput
                }
                ObjectStoreError::Unavailable(_) | ObjectStoreError::Serialization(_) => {
                    ErrorKind::RemoteUnavailable
                }
            },
            Self::Crypto { .. } => ErrorKind::Crypto,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DownloadFailed { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Retrying later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RemoteUnavailable | ErrorKind::Timeout
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
            Self::InvalidTags(msg) => write!(f, "Invalid tags: {}", msg),
            Self::NotFound(name) => write!(f, "File {} was not found", name),
            Self::Cache { op, name, source } => {
                write!(f, "Local cache {} failed for {}: {}", op, name, source)
            }
            Self::Remote { op, name, source } => {
                write!(f, "Remote {} failed for {}: {}", op, name, source)
            }
            Self::Crypto { name, source } => write!(f, "Envelope error for {}: {}", name, source),
            Self::Timeout { op, name, after } => {
                write!(f, "Remote {} for {} timed out after {:?}", op, name, after)
            }
            Self::DownloadFailed { name, source } => {
                write!(f, "Error downloading file {}: {}", name, source)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cache { source, .. } => Some(source),
            Self::Remote { source, .. } => Some(source),
            Self::Crypto { source, .. } => Some(source),
            Self::DownloadFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
