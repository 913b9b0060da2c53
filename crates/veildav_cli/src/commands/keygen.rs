//! Keygen command implementation.

use super::CliError;
use std::fs;
use std::path::Path;
use tracing::info;
use veildav_crypto::MasterKey;

/// Writes a key to `out` as hex.
///
/// With `derivation` set to `(passphrase, salt)` the key is derived, so the
/// same pair reproduces it on another device.
pub fn run(
    out: &Path,
    derivation: Option<(String, String)>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if out.exists() && !force {
        return Err(CliError::KeyFileExists(out.to_path_buf()).into());
    }

    let key = match &derivation {
        Some((passphrase, salt)) => {
            MasterKey::derive_from_passphrase(passphrase.as_bytes(), salt.as_bytes())?
        }
        None => MasterKey::generate(),
    };
    fs::write(out, format!("{}\n", key.to_hex()))?;
    info!(path = ?out, derived = derivation.is_some(), "wrote key file");

    println!("✓ Key written to {:?}", out);
    if derivation.is_some() {
        println!("  Derived from passphrase; keep the salt with it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::load_key;

    #[test]
    fn generated_key_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        run(&path, None, false).unwrap();
        load_key(&path).unwrap();
    }

    #[test]
    fn derived_key_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.key");
        let second = dir.path().join("b.key");
        let pair = || Some(("correct horse".to_string(), "battery".to_string()));
        run(&first, pair(), false).unwrap();
        run(&second, pair(), false).unwrap();
        assert_eq!(
            load_key(&first).unwrap().as_bytes(),
            load_key(&second).unwrap().as_bytes()
        );
    }

    #[test]
    fn existing_key_is_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        run(&path, None, false).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(run(&path, None, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        run(&path, None, true).unwrap();
        assert_ne!(fs::read_to_string(&path).unwrap(), before);
    }
}
