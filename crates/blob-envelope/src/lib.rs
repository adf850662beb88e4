//! Blob Envelope
//!
//! Symmetric encryption of opaque byte payloads for the remote tier.
//! An envelope is `IV(16) || ciphertext`, where the ciphertext carries the
//! AES-GCM authentication tag, so it can be opened with nothing but the key.

pub mod envelope;
pub mod error;

pub use envelope::{decrypt, encrypt, Envelope, EnvelopeKey, IV_LEN, KEY_LEN, TAG_LEN};
pub use error::{EnvelopeError, Result};
