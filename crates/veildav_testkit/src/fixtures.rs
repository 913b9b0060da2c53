//! Record fixtures, keys and temporary file layouts.

use std::path::PathBuf;
use tempfile::TempDir;
use veildav_core::{Contact, Event};
use veildav_crypto::MasterKey;

/// A fixed key, so failures reproduce.
pub fn test_key() -> MasterKey {
    MasterKey::from_bytes(&[0x42; 32]).expect("32 bytes is a valid key")
}

/// A different fixed key.
pub fn other_key() -> MasterKey {
    MasterKey::from_bytes(&[0x17; 32]).expect("32 bytes is a valid key")
}

/// A new local contact without UID.
pub fn contact_named(name: &str) -> Contact {
    Contact::new(name).with_field("EMAIL", format!("{}@example.org", name.to_lowercase()))
}

/// A contact with a UID, as a server would return it.
pub fn contact_with_uid(uid: &str, name: &str) -> Contact {
    let mut contact = contact_named(name);
    contact.uid = Some(uid.to_string());
    contact
}

/// A one-hour event with a UID.
pub fn event_with_uid(uid: &str, summary: &str, starts_at: i64) -> Event {
    let mut event = Event::new(summary, starts_at, starts_at + 3600);
    event.uid = Some(uid.to_string());
    event
}

/// A daily recurring event with a UID.
pub fn recurring_event(uid: &str, summary: &str, starts_at: i64) -> Event {
    let mut event = event_with_uid(uid, summary, starts_at);
    event.recurrence_rule = Some("FREQ=DAILY".to_string());
    event
}

/// An exception overriding one instance of `parent_uid`.
pub fn exception_event(uid: &str, parent_uid: &str, instance_start: i64) -> Event {
    event_with_uid(uid, "Moved", instance_start + 1800).exception_of(parent_uid, instance_start)
}

/// File locations for a file-backed local store, state and server, removed
/// on drop.
pub struct TempLayout {
    /// Local store snapshot.
    pub local: PathBuf,
    /// Sync state file.
    pub state: PathBuf,
    /// Server snapshot.
    pub server: PathBuf,
    /// Key file.
    pub key: PathBuf,
    _dir: TempDir,
}

impl TempLayout {
    /// Creates the layout in a new temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            local: dir.path().join("local.json"),
            state: dir.path().join("state.json"),
            server: dir.path().join("server.json"),
            key: dir.path().join("master.key"),
            _dir: dir,
        }
    }
}

impl Default for TempLayout {
    fn default() -> Self {
        Self::new()
    }
}
