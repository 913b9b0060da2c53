//! CLI command implementations.

pub mod add_contact;
pub mod inspect;
pub mod keygen;
pub mod sync;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use veildav_crypto::MasterKey;

/// Errors raised by the commands themselves.
#[derive(Debug, Error)]
pub enum CliError {
    /// Refusing to replace a key file.
    #[error("key file {0:?} already exists (use --force to replace it)")]
    KeyFileExists(PathBuf),

    /// The key file could not be read.
    #[error("cannot read key file {path:?}: {message}")]
    KeyFile {
        /// Key file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Credentials were refused by the server.
    #[error("the server refused the credentials")]
    Unauthorized,
}

/// Loads a hex key file written by `keygen`.
pub fn load_key(path: &Path) -> Result<MasterKey, CliError> {
    let text = fs::read_to_string(path).map_err(|e| CliError::KeyFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    MasterKey::from_hex(text.trim()).map_err(|e| CliError::KeyFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_key(&dir.path().join("absent.key")).unwrap_err();
        assert!(matches!(err, CliError::KeyFile { .. }));
    }

    #[test]
    fn malformed_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.key");
        fs::write(&path, "not hex").unwrap();
        assert!(matches!(load_key(&path), Err(CliError::KeyFile { .. })));
    }
}
