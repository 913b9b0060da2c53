//! Add-contact command implementation.

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use veildav_core::{Contact, LocalAccount, LocalStore, MemoryStateStore, QueueLimits};

/// Creates a new, unsynced contact in `collection`, creating the collection
/// if needed.
pub fn run(
    local: &Path,
    collection: &str,
    name: &str,
    email: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Sync state is untouched here.
    let store: LocalStore<Contact> = LocalStore::open_file(
        local,
        Arc::new(MemoryStateStore::new()),
        QueueLimits::default(),
    )?;
    store.create_collection(collection)?;

    let mut contact = Contact::new(name);
    if let Some(email) = email {
        contact = contact.with_field("EMAIL", email);
    }
    let id = store.create_component(collection, contact)?;
    info!(%collection, %id, "created local contact");

    println!("✓ Added {name} to {collection} ({id})");
    println!("  It will be uploaded by the next sync");
    Ok(())
}
