//! Error types for the hiding codec.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while framing or opening a hidden payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication failed: wrong key or tampered ciphertext.
    #[error("invalid MAC: ciphertext failed authentication")]
    InvalidMac,

    /// The opaque value is not a frame this codec can read.
    #[error("malformed frame: {message}")]
    MalformedFrame {
        /// Why the frame was rejected.
        message: String,
    },

    /// Key material of the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected key size.
        expected: usize,
        /// Actual key size.
        actual: usize,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The AEAD refused to encrypt.
    #[error("encryption failed")]
    Encryption,
}

impl CryptoError {
    /// Creates a malformed frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Returns true if this error signals tampering or a key mismatch.
    pub fn is_mac_failure(&self) -> bool {
        matches!(self, CryptoError::InvalidMac)
    }
}
