//! Per-collection sync state: CTag, display name and color.

use crate::error::CoreResult;
use crate::persist::{read_json, write_json_atomically};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Keys of the per-collection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// CTag recorded by the last successful pass.
    CTag,
    /// Local display name of the collection.
    DisplayName,
    /// Local color of the collection.
    Color,
}

impl StateKey {
    fn as_str(&self) -> &'static str {
        match self {
            StateKey::CTag => "ctag",
            StateKey::DisplayName => "display_name",
            StateKey::Color => "color",
        }
    }
}

type StateMap = BTreeMap<String, BTreeMap<String, String>>;

/// Key-value state scoped per collection path.
pub trait SyncStateStore: Send + Sync {
    /// Reads a value.
    fn get(&self, path: &str, key: StateKey) -> CoreResult<Option<String>>;

    /// Writes a value; `None` removes it.
    fn set(&self, path: &str, key: StateKey, value: Option<&str>) -> CoreResult<()>;

    /// Removes every value of a collection.
    fn remove_collection(&self, path: &str) -> CoreResult<()>;
}

fn apply(map: &mut StateMap, path: &str, key: StateKey, value: Option<&str>) {
    match value {
        Some(value) => {
            map.entry(path.to_string())
                .or_default()
                .insert(key.as_str().to_string(), value.to_string());
        }
        None => {
            if let Some(entries) = map.get_mut(path) {
                entries.remove(key.as_str());
                if entries.is_empty() {
                    map.remove(path);
                }
            }
        }
    }
}

/// In-memory state, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<StateMap>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStateStore for MemoryStateStore {
    fn get(&self, path: &str, key: StateKey) -> CoreResult<Option<String>> {
        Ok(self
            .entries
            .read()
            .get(path)
            .and_then(|entries| entries.get(key.as_str()).cloned()))
    }

    fn set(&self, path: &str, key: StateKey, value: Option<&str>) -> CoreResult<()> {
        apply(&mut self.entries.write(), path, key, value);
        Ok(())
    }

    fn remove_collection(&self, path: &str) -> CoreResult<()> {
        self.entries.write().remove(path);
        Ok(())
    }
}

/// State persisted as a JSON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct FileStateStore {
    file: PathBuf,
    entries: RwLock<StateMap>,
}

impl FileStateStore {
    /// Opens the store, loading `file` if it exists.
    pub fn open(file: impl AsRef<Path>) -> CoreResult<Self> {
        let file = file.as_ref().to_path_buf();
        let entries = read_json(&file)?.unwrap_or_default();
        Ok(Self {
            file,
            entries: RwLock::new(entries),
        })
    }
}

impl SyncStateStore for FileStateStore {
    fn get(&self, path: &str, key: StateKey) -> CoreResult<Option<String>> {
        Ok(self
            .entries
            .read()
            .get(path)
            .and_then(|entries| entries.get(key.as_str()).cloned()))
    }

    fn set(&self, path: &str, key: StateKey, value: Option<&str>) -> CoreResult<()> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        apply(&mut updated, path, key, value);
        write_json_atomically(&self.file, &updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove_collection(&self, path: &str) -> CoreResult<()> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        updated.remove(path);
        write_json_atomically(&self.file, &updated)?;
        *entries = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_scopes_by_path() {
        let store = MemoryStateStore::new();
        store.set("contacts/default", StateKey::CTag, Some("c1")).unwrap();
        store.set("calendars/work", StateKey::CTag, Some("c9")).unwrap();

        assert_eq!(
            store.get("contacts/default", StateKey::CTag).unwrap().as_deref(),
            Some("c1")
        );
        assert_eq!(store.get("contacts/default", StateKey::DisplayName).unwrap(), None);

        store.set("contacts/default", StateKey::CTag, None).unwrap();
        assert_eq!(store.get("contacts/default", StateKey::CTag).unwrap(), None);
        assert!(store.get("calendars/work", StateKey::CTag).unwrap().is_some());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sync-state.json");

        {
            let store = FileStateStore::open(&file).unwrap();
            store.set("contacts/default", StateKey::DisplayName, Some("Friends")).unwrap();
            store.set("contacts/default", StateKey::CTag, Some("c3")).unwrap();
            store.set("old", StateKey::CTag, Some("c0")).unwrap();
            store.remove_collection("old").unwrap();
        }

        let reopened = FileStateStore::open(&file).unwrap();
        assert_eq!(
            reopened.get("contacts/default", StateKey::DisplayName).unwrap().as_deref(),
            Some("Friends")
        );
        assert_eq!(
            reopened.get("contacts/default", StateKey::CTag).unwrap().as_deref(),
            Some("c3")
        );
        assert_eq!(reopened.get("old", StateKey::CTag).unwrap(), None);
    }
}
