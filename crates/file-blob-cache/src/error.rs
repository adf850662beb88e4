//! Error types for the local blob cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    InvalidName(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_name_display() {
        let err = CacheError::InvalidName("../secret".to_string());
        assert_eq!(format!("{}", err), "Invalid file name: \"../secret\"");
    }

    #[test]
    fn test_io_error_has_source() {
        let err: CacheError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(format!("{}", err).contains("denied"));
        assert!(err.source().is_some());
    }
}
