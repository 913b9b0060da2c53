//! Local store behavior across handles, files and record kinds.

use std::sync::Arc;
use tempfile::tempdir;
use veildav_core::{
    Contact, CoreError, ETag, Event, FileStateStore, LocalAccount, LocalStore, MemoryStateStore,
    QueueLimits, StateKey,
};

const CALENDAR: &str = "calendars/work";
const BOOK: &str = "contacts/default";

fn event_with_uid(summary: &str, uid: &str) -> Event {
    let mut event = Event::new(summary, 100, 200);
    event.uid = Some(uid.to_string());
    event
}

#[test]
fn exception_requires_its_parent() {
    let store: LocalStore<Event> = LocalStore::in_memory(Arc::new(MemoryStateStore::new()));
    store.create_collection(CALENDAR).unwrap();
    let mut collection = store.open(CALENDAR).unwrap();

    let exception = event_with_uid("Moved standup", "ex-1").exception_of("parent-1", 150);
    let err = collection.queue_add(exception.clone(), None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::MissingDependency { ref uid, ref parent } if uid == "ex-1" && parent == "parent-1"
    ));

    // A parent staged earlier in the same batch satisfies the dependency.
    collection
        .queue_add(event_with_uid("Standup", "parent-1"), Some(ETag::new("p")))
        .unwrap();
    collection.queue_add(exception, Some(ETag::new("x"))).unwrap();
    assert_eq!(collection.commit().unwrap(), 2);
    assert!(collection.component_by_uid("ex-1").unwrap().is_some());
}

#[test]
fn handles_have_independent_queues() {
    let store: LocalStore<Contact> = LocalStore::in_memory(Arc::new(MemoryStateStore::new()));
    store.create_collection(BOOK).unwrap();
    let mut first = store.open(BOOK).unwrap();
    let second = store.open(BOOK).unwrap();

    let mut contact = Contact::new("Ada");
    contact.uid = Some("ada".into());
    first.queue_add(contact, None).unwrap();
    assert_eq!(second.pending_operations(), 0);

    first.commit().unwrap();
    assert!(second.component_by_uid("ada").unwrap().is_some());
}

#[test]
fn queue_reports_full_at_operation_bound() {
    let store: LocalStore<Contact> = LocalStore::with_limits(
        Arc::new(MemoryStateStore::new()),
        QueueLimits::new(2, 1 << 20),
    );
    store.create_collection(BOOK).unwrap();
    let mut collection = store.open(BOOK).unwrap();

    for uid in ["a", "b"] {
        let mut contact = Contact::new(uid);
        contact.uid = Some(uid.into());
        collection.queue_add(contact, None).unwrap();
    }
    assert!(collection.is_queue_full());

    let mut third = Contact::new("c");
    third.uid = Some("c".into());
    assert!(matches!(
        collection.queue_add(third, None),
        Err(CoreError::QueueFull { operations: 2, .. })
    ));
    assert_eq!(collection.commit().unwrap(), 2);
}

#[test]
fn store_and_state_survive_reopen() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("local.json");
    let state_file = dir.path().join("state.json");

    {
        let state = Arc::new(FileStateStore::open(&state_file).unwrap());
        let store: LocalStore<Contact> =
            LocalStore::open_file(&data, state, QueueLimits::default()).unwrap();
        store.create_collection(BOOK).unwrap();
        store
            .create_component(BOOK, Contact::new("Grace").with_field("EMAIL", "g@example.org"))
            .unwrap();
        let mut collection = store.open(BOOK).unwrap();
        collection.set_ctag(&veildav_core::CTag::new("c1")).unwrap();
    }

    let state = Arc::new(FileStateStore::open(&state_file).unwrap());
    let store: LocalStore<Contact> =
        LocalStore::open_file(&data, state, QueueLimits::default()).unwrap();
    let components = store.components(BOOK).unwrap();
    assert_eq!(components.len(), 1);
    assert!(components[0].is_new());
    assert_eq!(
        components[0].component.fields.get("EMAIL").map(String::as_str),
        Some("g@example.org")
    );
    assert_eq!(
        store.state().get(BOOK, StateKey::CTag).unwrap().as_deref(),
        Some("c1")
    );
}

#[test]
fn failed_commit_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("local.json");
    let store: LocalStore<Contact> = LocalStore::open_file(
        &data,
        Arc::new(MemoryStateStore::new()),
        QueueLimits::default(),
    )
    .unwrap();
    store.create_collection(BOOK).unwrap();
    let before = std::fs::read(&data).unwrap();

    let mut collection = store.open(BOOK).unwrap();
    let mut contact = Contact::new("Linus");
    contact.uid = Some("linus".into());
    collection.queue_add(contact, None).unwrap();
    store.fail_next_commit();
    assert!(collection.commit().is_err());

    assert_eq!(std::fs::read(&data).unwrap(), before);
}
