//! Error types for the object store client

use std::fmt;

#[derive(Debug)]
pub enum ObjectStoreError {
    /// The referenced object does not exist
    NotFound(String),
    /// Transport, auth or backing-storage failure
    Unavailable(String),
    InvalidName(String),
    InvalidTags(String),
    Serialization(String),
}

impl ObjectStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "Object not found: {}", name),
            Self::Unavailable(msg) => write!(f, "Remote store unavailable: {}", msg),
            Self::InvalidName(name) => write!(f, "Invalid object name: {:?}", name),
            Self::InvalidTags(msg) => write!(f, "Invalid tags: {}", msg),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ObjectStoreError {}

impl From<serde_json::Error> for ObjectStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ObjectStoreError>;
