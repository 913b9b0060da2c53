//! # veildav crypto
//!
//! The content-hiding envelope used by veildav.
//!
//! Every record that leaves the device is serialized, encrypted and framed by
//! a [`CipherService`] before it is embedded in a neutral record that the
//! server stores. Reading reverses the process and fails closed: a wrong key
//! or a tampered frame yields [`CryptoError::InvalidMac`], never bytes.
//!
//! ## Frame format
//!
//! Before base64 (standard alphabet, padded):
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The version byte is authenticated as associated data.
//!
//! ## Usage
//!
//! ```
//! use veildav_crypto::{AesGcmCipher, CipherService, MasterKey};
//!
//! let cipher = AesGcmCipher::new(&MasterKey::generate());
//! let opaque = cipher.frame_and_encrypt(b"BEGIN:VCARD").unwrap();
//! assert_eq!(cipher.decode_and_decrypt(&opaque).unwrap(), b"BEGIN:VCARD");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod key;

pub use cipher::{AesGcmCipher, CipherService, FRAME_VERSION, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{MasterKey, KEY_SIZE};
