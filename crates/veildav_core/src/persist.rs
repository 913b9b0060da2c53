//! Snapshot persistence helpers shared by the file-backed stores.

use crate::error::CoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `value` as JSON to `path`, replacing the previous file atomically.
///
/// The data is written and synced to a sibling temp file, then renamed over
/// the target, so readers see either the old or the new snapshot.
pub fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);

    let mut file = fs::File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a JSON snapshot; a missing file yields `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut value = BTreeMap::new();
        value.insert("calendars/work".to_string(), "c-7".to_string());
        write_json_atomically(&path, &value).unwrap();

        let read: BTreeMap<String, String> = read_json(&path).unwrap().unwrap();
        assert_eq!(read, value);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let read: Option<BTreeMap<String, String>> =
            read_json(&dir.path().join("absent.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(read_json::<BTreeMap<String, String>>(&path).is_err());
    }
}
