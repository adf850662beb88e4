//! Error types for blob envelopes

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Key material has the wrong length (holds the length that was given)
    InvalidKey(usize),
    /// Envelope is too short to contain an IV (holds the envelope length)
    Malformed(usize),
    /// Authentication failed: wrong key or corrupted data
    DecryptionFailed,
    Encryption(String),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey(len) => {
                write!(f, "Invalid key: expected 32 bytes, got {}", len)
            }
            Self::Malformed(len) => {
                write!(f, "Malformed envelope: {} bytes is shorter than the IV", len)
            }
            Self::DecryptionFailed => write!(f, "Decryption failed: wrong key or corrupted data"),
            Self::Encryption(msg) => write!(f, "Encryption error: {}", msg),
        }
    }
}

impl std::error::Error for EnvelopeError {}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
