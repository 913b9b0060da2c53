//! The cipher service contract and its AES-256-GCM implementation.

use crate::error::{CryptoError, CryptoResult};
use crate::key::MasterKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Version byte at the head of every frame.
pub const FRAME_VERSION: u8 = 0x01;

/// Encrypts and frames opaque payloads.
///
/// Implementations must be deterministic per key in what they can open, may
/// produce a different frame on every call, and must fail closed: opening a
/// frame produced under another key, or a modified frame, returns
/// [`CryptoError::InvalidMac`].
pub trait CipherService: Send + Sync {
    /// Encrypts `plaintext` and returns a self-describing text frame.
    fn frame_and_encrypt(&self, plaintext: &[u8]) -> CryptoResult<String>;

    /// Reverses [`frame_and_encrypt`](Self::frame_and_encrypt).
    fn decode_and_decrypt(&self, opaque: &str) -> CryptoResult<Vec<u8>>;
}

/// AES-256-GCM cipher service with a fresh random nonce per frame.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// Creates a cipher service for `key`.
    #[must_use]
    pub fn new(key: &MasterKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }
}

impl CipherService for AesGcmCipher {
    fn frame_and_encrypt(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let header = [FRAME_VERSION];
        let sealed = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut frame = Vec::with_capacity(1 + NONCE_SIZE + sealed.len());
        frame.push(FRAME_VERSION);
        frame.extend_from_slice(&nonce_bytes);
        frame.extend(sealed);

        Ok(STANDARD.encode(frame))
    }

    fn decode_and_decrypt(&self, opaque: &str) -> CryptoResult<Vec<u8>> {
        let frame = STANDARD
            .decode(opaque.trim())
            .map_err(|e| CryptoError::malformed(format!("not base64: {e}")))?;

        if frame.len() < 1 + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::malformed("frame too short"));
        }
        if frame[0] != FRAME_VERSION {
            return Err(CryptoError::malformed(format!(
                "unknown frame version {}",
                frame[0]
            )));
        }

        let nonce = Nonce::from_slice(&frame[1..1 + NONCE_SIZE]);
        let sealed = &frame[1 + NONCE_SIZE..];

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: sealed,
                    aad: &frame[..1],
                },
            )
            .map_err(|_| CryptoError::InvalidMac)
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}
