//! AES-256-GCM envelope sealing and opening

use crate::error::{EnvelopeError, Result};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use tracing::debug;

/// Key size for AES-256
pub const KEY_LEN: usize = 32;

/// IV size, one AES block
pub const IV_LEN: usize = 16;

/// GCM authentication tag appended to the ciphertext
pub const TAG_LEN: usize = 16;

/// AES-256-GCM with a full-block IV so the envelope layout is `IV(16) || ciphertext`
type BlockIvAes256Gcm = AesGcm<Aes256, U16>;

/// Raw symmetric key material
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    /// Build a key from raw bytes, which must be exactly 32 bytes long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| EnvelopeError::InvalidKey(bytes.len()))?;
        Ok(Self(key))
    }

    /// Parse configured key material.
    ///
    /// Accepts base64 that decodes to 32 bytes, or a raw 32-byte string.
    pub fn parse(value: &str) -> Result<Self> {
        if let Ok(decoded) = STANDARD.decode(value.trim()) {
            if decoded.len() == KEY_LEN {
                return Self::from_bytes(&decoded);
            }
        }
        Self::from_bytes(value.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}

/// Seals and opens envelopes under a single key
#[derive(Clone)]
pub struct Envelope {
    cipher: BlockIvAes256Gcm,
}

impl Envelope {
    pub fn new(key: &EnvelopeKey) -> Self {
        Self {
            cipher: BlockIvAes256Gcm::new(Key::<BlockIvAes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Create an envelope from raw key bytes, failing with `InvalidKey` on a bad length
    pub fn from_key_bytes(key: &[u8]) -> Result<Self> {
        Ok(Self::new(&EnvelopeKey::from_bytes(key)?))
    }

    /// Encrypt `plaintext` under a freshly generated IV
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let iv = BlockIvAes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&iv, plaintext)
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(IV_LEN + ciphertext.len());
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&ciphertext);

        debug!(
            plaintext_len = plaintext.len(),
            envelope_len = sealed.len(),
            "Sealed envelope"
        );
        Ok(sealed)
    }

    /// Split the IV off `envelope` and decrypt the remainder
    pub fn open(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < IV_LEN {
            return Err(EnvelopeError::Malformed(envelope.len()));
        }

        let (iv, ciphertext) = envelope.split_at(IV_LEN);
        self.cipher
            .decrypt(Nonce::<U16>::from_slice(iv), ciphertext)
            .map_err(|_| EnvelopeError::DecryptionFailed)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").finish_non_exhaustive()
    }
}

/// Encrypt `plaintext` with a raw 32-byte key
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Envelope::from_key_bytes(key)?.seal(plaintext)
}

/// Decrypt an envelope produced by [`encrypt`] with the same key
pub fn decrypt(envelope: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Envelope::from_key_bytes(key)?.open(envelope)
}
