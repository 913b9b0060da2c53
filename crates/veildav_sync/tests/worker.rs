//! Single-collection passes against the in-memory server.

use proptest::prelude::*;
use std::collections::HashMap;
use veildav_core::{
    CTag, Component, Contact, CoreResult, ETag, Event, LocalCollection, LocalComponent, LocalId,
    QueueLimits,
};
use veildav_remote::{RemoteCollection, PLACEHOLDER_DISPLAY_NAME};
use veildav_sync::{
    CancelHandle, FailureKind, SyncConfig, SyncWorker, WorkerOutcome, WorkerReport,
};
use veildav_testkit::prelude::*;

const PATH: &str = "contacts/default";

fn sync<C: Component>(harness: &PairHarness<C>) -> WorkerReport {
    sync_with(harness, SyncConfig::default())
}

fn sync_with<C: Component>(
    harness: &PairHarness<C>,
    config: SyncConfig,
) -> WorkerReport {
    SyncWorker::new(harness.local(), harness.remote(), config).run()
}

fn synced_contacts(uids: &[(&str, &str)]) -> PairHarness<Contact> {
    let harness = PairHarness::new(PATH);
    for (uid, name) in uids {
        harness.seed_remote(&contact_with_uid(uid, name));
    }
    let report = sync(&harness);
    assert!(report.checkpointed(), "initial sync failed: {report:?}");
    harness
}

// ============================================================================
// Push and pull
// ============================================================================

#[test]
fn new_local_component_gets_uid_and_etag() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    let id = harness.create_local(contact_named("Ada"));

    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(report.statistics.inserts, 1);

    let local = harness
        .local_components()
        .into_iter()
        .find(|c| c.id == id)
        .unwrap();
    let uid = local.uid().unwrap().to_string();
    assert!(!local.dirty);
    assert_eq!(harness.remote_uids(), vec![uid.clone()]);

    let (_, server_etag) = harness.server.stored(PATH, &uid).unwrap();
    assert_eq!(local.etag, Some(server_etag));
    assert_eq!(harness.remote_component(&uid).unwrap().formatted_name, "Ada");
    assert_eq!(harness.local_ctag(), harness.remote_ctag());
}

#[test]
fn remote_update_is_applied_locally() {
    let harness = synced_contacts(&[("u2", "Grace")]);
    let (_, first_etag) = harness.server.stored(PATH, "u2").unwrap();

    let peer = harness.peer();
    peer.update_hidden_component(&contact_with_uid("u2", "Grace Hopper"), &first_etag)
        .unwrap();
    let (_, second_etag) = harness.server.stored(PATH, "u2").unwrap();
    assert_ne!(first_etag, second_etag);

    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(report.statistics.updates, 1);

    let local = harness.local_by_uid("u2").unwrap();
    assert_eq!(local.component.formatted_name, "Grace Hopper");
    assert_eq!(local.etag, Some(second_etag));
    assert!(!local.dirty);
}

#[test]
fn local_edit_is_pushed_with_precondition() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let local = harness.local_by_uid("u1").unwrap();
    harness
        .store
        .edit_component(PATH, local.id, contact_with_uid("u1", "Ada Lovelace"))
        .unwrap();

    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(report.statistics.updates, 1);
    assert_eq!(
        harness.remote_component("u1").unwrap().formatted_name,
        "Ada Lovelace"
    );

    let local = harness.local_by_uid("u1").unwrap();
    assert!(!local.dirty);
    assert_eq!(local.etag, Some(harness.server.stored(PATH, "u1").unwrap().1));
}

#[test]
fn second_pass_changes_nothing() {
    let harness = synced_contacts(&[("u1", "Ada"), ("u2", "Grace")]);
    harness.create_local(contact_named("Linus"));
    assert!(sync(&harness).checkpointed());

    let writes = harness.server.write_count();
    let ctag = harness.local_ctag();

    let report = sync(&harness);
    assert!(!report.statistics.has_changes());
    assert!(!report.statistics.has_failures());
    assert_eq!(report.outcome, WorkerOutcome::Completed { checkpointed: false });
    assert_eq!(harness.server.write_count(), writes);
    assert_eq!(harness.local_ctag(), ctag);
    assert_eq!(harness.local_components().len(), 3);
}

#[test]
fn remote_removal_purges_local_copy() {
    let harness = synced_contacts(&[("u1", "Ada"), ("u2", "Grace")]);
    harness.peer().remove_component("u2", None).unwrap();

    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(report.statistics.deletes, 1);
    assert!(harness.local_by_uid("u2").is_none());
    assert!(harness.local_by_uid("u1").is_some());
}

#[test]
fn unpushed_local_component_survives_pull() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    harness.seed_remote(&contact_with_uid("u2", "Grace"));
    harness.server.set_creates_failing(true);
    harness.create_local(contact_named("Linus"));

    let report = sync(&harness);
    assert_eq!(report.statistics.io_failures, 1);
    assert_eq!(report.statistics.inserts, 1);
    assert_eq!(harness.local_components().len(), 3);
}

#[test]
fn local_deletion_is_pushed() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let local = harness.local_by_uid("u1").unwrap();
    harness.store.flag_deleted(PATH, local.id).unwrap();

    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(report.statistics.deletes, 1);
    assert!(harness.remote_uids().is_empty());
    assert!(harness.local_components().is_empty());
}

#[test]
fn deletion_of_component_already_gone_remotely_succeeds() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    harness.server.remove_raw(PATH, "u1").unwrap();
    let local = harness.local_by_uid("u1").unwrap();
    harness.store.flag_deleted(PATH, local.id).unwrap();

    let report = sync(&harness);
    assert_eq!(report.statistics.deletes, 1);
    assert!(!report.statistics.has_failures());
    assert!(harness.local_components().is_empty());
}

#[test]
fn remote_wins_over_local_delete_of_edited_component() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let (_, etag) = harness.server.stored(PATH, "u1").unwrap();
    harness
        .peer()
        .update_hidden_component(&contact_with_uid("u1", "Ada K."), &etag)
        .unwrap();
    let local = harness.local_by_uid("u1").unwrap();
    harness.store.flag_deleted(PATH, local.id).unwrap();

    let report = sync(&harness);
    assert_eq!(report.statistics.conflicts, 1);
    assert!(report.checkpointed());

    let local = harness.local_by_uid("u1").unwrap();
    assert!(!local.deleted);
    assert_eq!(local.component.formatted_name, "Ada K.");
}

// ============================================================================
// Failure containment and the checkpoint
// ============================================================================

#[test]
fn unreadable_component_blocks_checkpoint_but_not_the_rest() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    for (uid, name) in [("u1", "Ada"), ("u2", "Grace"), ("u3", "Linus")] {
        harness.seed_remote(&contact_with_uid(uid, name));
    }
    harness.tamper_remote("u2");

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 2);
    assert_eq!(report.statistics.mac_failures, 1);
    assert_eq!(report.outcome, WorkerOutcome::Completed { checkpointed: false });
    assert!(harness.local_ctag().is_none());
    assert!(harness.local_by_uid("u1").is_some());
    assert!(harness.local_by_uid("u2").is_none());
    assert!(harness.local_by_uid("u3").is_some());

    harness.server.remove_raw(PATH, "u2").unwrap();
    let report = sync(&harness);
    assert!(report.checkpointed());
    assert_eq!(harness.local_ctag(), harness.remote_ctag());
}

#[test]
fn collection_written_under_another_key_is_not_touched() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness
        .peer_with_key(&other_key())
        .add_hidden_component(&contact_with_uid("foreign", "Mallory"))
        .unwrap();
    harness.create_local(contact_named("Ada"));

    let report = sync(&harness);
    assert_eq!(report.statistics.mac_failures, 1);
    assert_eq!(report.statistics.inserts, 0);
    assert!(!report.checkpointed());
    assert_eq!(harness.remote_uids(), vec!["foreign"]);
    assert!(harness.local_components()[0].is_new());
}

#[test]
fn malformed_frame_counts_as_parse_failure() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness.seed_remote(&contact_with_uid("u1", "Ada"));
    harness.store_garbage("g1");

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    assert_eq!(report.statistics.parse_failures, 1);
    assert!(!report.checkpointed());
}

#[test]
fn failed_commit_blocks_checkpoint_and_is_retried() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let ctag = harness.local_ctag();
    harness.seed_remote(&contact_with_uid("u2", "Grace"));
    harness.store.fail_next_commit();

    let report = sync(&harness);
    assert_eq!(report.statistics.io_failures, 1);
    assert_eq!(report.statistics.inserts, 0);
    assert!(!report.checkpointed());
    assert_eq!(harness.local_ctag(), ctag);

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    assert!(report.checkpointed());
    assert!(harness.local_by_uid("u2").is_some());
}

/// Local collection whose commit drops the queue and reports nothing applied.
struct ShortCommit<C: Component>(Box<dyn LocalCollection<C>>);

impl<C: Component> LocalCollection<C> for ShortCommit<C> {
    fn path(&self) -> &str {
        self.0.path()
    }
    fn new_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.0.new_ids()
    }
    fn updated_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.0.updated_ids()
    }
    fn deleted_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.0.deleted_ids()
    }
    fn all_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.0.all_ids()
    }
    fn uid_index(&self) -> CoreResult<HashMap<String, (LocalId, Option<ETag>)>> {
        self.0.uid_index()
    }
    fn component_by_id(&self, id: LocalId) -> CoreResult<Option<LocalComponent<C>>> {
        self.0.component_by_id(id)
    }
    fn component_by_uid(&self, uid: &str) -> CoreResult<Option<LocalComponent<C>>> {
        self.0.component_by_uid(uid)
    }
    fn queue_add(&mut self, component: C, etag: Option<ETag>) -> CoreResult<()> {
        self.0.queue_add(component, etag)
    }
    fn queue_update(&mut self, id: LocalId, component: C, etag: Option<ETag>) -> CoreResult<()> {
        self.0.queue_update(id, component, etag)
    }
    fn queue_remove(&mut self, id: LocalId) -> CoreResult<()> {
        self.0.queue_remove(id)
    }
    fn queue_assign_uid(&mut self, id: LocalId, uid: String) -> CoreResult<()> {
        self.0.queue_assign_uid(id, uid)
    }
    fn queue_clear_dirty(&mut self, id: LocalId, etag: Option<ETag>) -> CoreResult<()> {
        self.0.queue_clear_dirty(id, etag)
    }
    fn queue_mark_for_retry(&mut self, id: LocalId) -> CoreResult<()> {
        self.0.queue_mark_for_retry(id)
    }
    fn pending_operations(&self) -> usize {
        self.0.pending_operations()
    }
    fn is_queue_full(&self) -> bool {
        self.0.is_queue_full()
    }
    fn discard_pending(&mut self) {
        self.0.discard_pending()
    }
    fn commit(&mut self) -> CoreResult<usize> {
        self.0.discard_pending();
        Ok(0)
    }
    fn ctag(&self) -> CoreResult<Option<CTag>> {
        self.0.ctag()
    }
    fn set_ctag(&mut self, ctag: &CTag) -> CoreResult<()> {
        self.0.set_ctag(ctag)
    }
    fn display_name(&self) -> CoreResult<Option<String>> {
        self.0.display_name()
    }
    fn set_display_name(&mut self, name: Option<&str>) -> CoreResult<()> {
        self.0.set_display_name(name)
    }
    fn color(&self) -> CoreResult<Option<String>> {
        self.0.color()
    }
    fn set_color(&mut self, color: Option<&str>) -> CoreResult<()> {
        self.0.set_color(color)
    }
    fn has_local_changes(&self) -> CoreResult<bool> {
        self.0.has_local_changes()
    }
}

#[test]
fn commit_applying_nothing_blocks_checkpoint_and_is_retried() {
    let harness = synced_contacts(&[]);
    let ctag = harness.local_ctag();
    harness.seed_remote(&contact_with_uid("u1", "Ada"));

    let local = Box::new(ShortCommit(harness.local()));
    let report = SyncWorker::new(local, harness.remote(), SyncConfig::default()).run();
    assert_eq!(report.statistics.io_failures, 1);
    assert_eq!(report.statistics.inserts, 0);
    assert!(!report.checkpointed());
    assert_eq!(harness.local_ctag(), ctag);
    assert!(harness.local_by_uid("u1").is_none());

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    assert!(report.checkpointed());
    assert!(harness.local_by_uid("u1").is_some());
}

#[test]
fn payment_required_skips_the_collection() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    harness.server.set_payment_required(true);

    let report = sync(&harness);
    assert_eq!(report.statistics.skips, 1);
    assert_eq!(report.outcome, WorkerOutcome::Completed { checkpointed: false });
    assert_eq!(harness.server.open_connections(), 0);
}

#[test]
fn payment_required_for_one_write_does_not_end_the_pass() {
    let harness = synced_contacts(&[("u1", "Ada"), ("u2", "Grace")]);
    for (uid, name) in [("u1", "Ada Lovelace"), ("u2", "Grace Hopper")] {
        let local = harness.local_by_uid(uid).unwrap();
        harness
            .store
            .edit_component(PATH, local.id, contact_with_uid(uid, name))
            .unwrap();
    }
    harness.server.require_payment_for("u1");

    let report = sync(&harness);
    assert_eq!(report.statistics.skips, 1);
    assert_eq!(report.statistics.updates, 1);
    assert_eq!(report.outcome, WorkerOutcome::Completed { checkpointed: false });
    assert_eq!(
        harness.remote_component("u2").unwrap().formatted_name,
        "Grace Hopper"
    );
    assert!(harness.local_by_uid("u1").unwrap().dirty);
}

#[test]
fn refused_credentials_abort_the_pass() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness.create_local(contact_named("Ada"));
    harness.server.set_unauthorized(true);

    let report = sync(&harness);
    assert_eq!(report.outcome, WorkerOutcome::Aborted(FailureKind::Authorization));
    assert_eq!(report.statistics.auth_failures, 1);
    assert!(report.statistics.has_auth_failure());
    assert!(harness.local_ctag().is_none());
    assert_eq!(harness.server.open_connections(), 0);
    assert!(harness.local_components()[0].is_new());
}

#[test]
fn cancelled_pass_stops_before_touching_anything() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness.create_local(contact_named("Ada"));
    let cancel = CancelHandle::new();
    cancel.cancel();

    let report = SyncWorker::new(harness.local(), harness.remote(), SyncConfig::default())
        .with_cancel(cancel)
        .run();
    assert_eq!(report.outcome, WorkerOutcome::Aborted(FailureKind::Interrupted));
    assert!(!report.statistics.has_failures());
    assert_eq!(harness.server.write_count(), 0);
    assert_eq!(harness.server.open_connections(), 0);
}

#[test]
fn duplicate_uid_in_listing_blocks_checkpoint() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    harness.seed_remote(&contact_with_uid("u2", "Grace"));
    harness.server.duplicate_in_listing("u1");

    let report = sync(&harness);
    assert_eq!(report.statistics.parse_failures, 1);
    assert!(!report.checkpointed());
}

#[test]
fn precondition_conflict_resolves_to_remote_and_checkpoints() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let (_, etag) = harness.server.stored(PATH, "u1").unwrap();
    let local = harness.local_by_uid("u1").unwrap();
    harness
        .store
        .edit_component(PATH, local.id, contact_with_uid("u1", "Local Ada"))
        .unwrap();
    harness
        .peer()
        .update_hidden_component(&contact_with_uid("u1", "Remote Ada"), &etag)
        .unwrap();

    let report = sync(&harness);
    assert_eq!(report.statistics.conflicts, 1);
    assert_eq!(report.statistics.updates, 1);
    assert!(report.checkpointed());

    let local = harness.local_by_uid("u1").unwrap();
    assert_eq!(local.component.formatted_name, "Remote Ada");
    assert!(!local.dirty);
}

#[test]
fn refused_update_drops_local_copy_until_next_pull() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let local = harness.local_by_uid("u1").unwrap();
    harness
        .store
        .edit_component(PATH, local.id, contact_with_uid("u1", "Ada!"))
        .unwrap();
    harness.server.reject_puts_of("u1");

    let report = sync(&harness);
    assert_eq!(report.statistics.parse_failures, 1);
    assert!(!report.checkpointed());
    assert!(harness.local_by_uid("u1").is_none());
    assert_eq!(harness.remote_uids(), vec!["u1"]);

    harness.seed_remote(&contact_with_uid("u2", "Grace"));
    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 2);
    assert!(report.checkpointed());

    let local = harness.local_by_uid("u1").unwrap();
    assert_eq!(local.component.formatted_name, "Ada");
    assert!(!local.dirty);
}

#[test]
fn transient_creation_failure_is_retried_next_pass() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    let id = harness.create_local(contact_named("Ada"));
    harness.server.set_creates_failing(true);

    let report = sync(&harness);
    assert_eq!(report.statistics.io_failures, 1);
    assert_eq!(report.statistics.inserts, 0);
    assert!(!report.checkpointed());

    let local = harness
        .local_components()
        .into_iter()
        .find(|c| c.id == id)
        .unwrap();
    assert!(local.uid().is_none());
    assert!(local.dirty);
    assert!(harness.remote_uids().is_empty());

    harness.server.clear_faults();
    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    assert!(report.checkpointed());
    assert_eq!(harness.remote_uids().len(), 1);
}

#[test]
fn transient_update_failure_keeps_component_dirty() {
    let harness = synced_contacts(&[("u1", "Ada")]);
    let local = harness.local_by_uid("u1").unwrap();
    harness
        .store
        .edit_component(PATH, local.id, contact_with_uid("u1", "Ada L."))
        .unwrap();
    harness.server.fail_puts_of("u1");

    let report = sync(&harness);
    assert_eq!(report.statistics.io_failures, 1);
    assert!(!report.checkpointed());
    let local = harness.local_by_uid("u1").unwrap();
    assert!(local.dirty);
    assert_eq!(local.component.formatted_name, "Ada L.");

    harness.server.clear_faults();
    let report = sync(&harness);
    assert_eq!(report.statistics.updates, 1);
    assert_eq!(
        harness.remote_component("u1").unwrap().formatted_name,
        "Ada L."
    );
}

#[test]
fn write_without_reported_etag_is_pulled_again() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness.server.omit_put_etags(true);
    harness.create_local(contact_named("Ada"));

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    let local = &harness.local_components()[0];
    let uid = local.uid().unwrap();
    assert_eq!(local.etag, Some(harness.server.stored(PATH, uid).unwrap().1));
}

// ============================================================================
// Dependencies, batching and metadata
// ============================================================================

#[test]
fn exception_listed_before_its_parent_is_retried() {
    let harness: PairHarness<Event> = PairHarness::new("calendars/work");
    harness.seed_remote(&exception_event("a-child", "z-parent", 86_400));
    harness.seed_remote(&recurring_event("z-parent", "Standup", 0));

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 2);
    assert_eq!(report.statistics.parse_failures, 0);
    assert!(report.checkpointed());

    let child = harness.local_by_uid("a-child").unwrap();
    assert_eq!(child.component.depends_on(), Some("z-parent"));
}

#[test]
fn exception_without_parent_is_a_parse_failure() {
    let harness: PairHarness<Event> = PairHarness::new("calendars/work");
    harness.seed_remote(&exception_event("a-orphan", "nowhere", 86_400));
    harness.seed_remote(&event_with_uid("b-lunch", "Lunch", 43_200));

    let report = sync(&harness);
    assert_eq!(report.statistics.inserts, 1);
    assert_eq!(report.statistics.parse_failures, 1);
    assert!(!report.checkpointed());
    assert!(harness.local_by_uid("a-orphan").is_none());
    assert!(harness.local_by_uid("b-lunch").is_some());
}

#[test]
fn small_batches_and_queue_bounds_still_pull_everything() {
    let harness: PairHarness<Contact> =
        PairHarness::with_limits(PATH, QueueLimits::new(3, 1 << 20));
    for i in 0..10 {
        harness.seed_remote(&contact_with_uid(&format!("u{i:02}"), &format!("Person {i}")));
    }

    let report = sync_with(&harness, SyncConfig::default().with_pull_batch_size(4));
    assert_eq!(report.statistics.inserts, 10);
    assert!(report.checkpointed());
    assert_eq!(harness.local_components().len(), 10);
}

#[test]
fn display_name_is_hidden_and_shared() {
    let harness: PairHarness<Contact> = PairHarness::new(PATH);
    harness
        .local()
        .set_display_name(Some("Family"))
        .unwrap();

    assert!(sync(&harness).checkpointed());
    let properties = harness.server.properties(PATH).unwrap();
    assert_eq!(
        properties[veildav_remote::DISPLAY_NAME_PROPERTY],
        PLACEHOLDER_DISPLAY_NAME
    );
    assert!(properties.values().all(|value| value != "Family"));
    assert_eq!(
        harness.peer().hidden_display_name().unwrap().as_deref(),
        Some("Family")
    );
}

#[test]
fn local_rename_is_pushed_when_ctags_agree() {
    let harness = synced_contacts(&[]);
    harness.local().set_display_name(Some("Friends")).unwrap();

    sync(&harness);
    assert_eq!(
        harness.peer().hidden_display_name().unwrap().as_deref(),
        Some("Friends")
    );
}

#[test]
fn remote_rename_wins_when_server_moved() {
    let harness = synced_contacts(&[]);
    harness.local().set_display_name(Some("Mine")).unwrap();
    let mut peer = harness.peer();
    peer.set_hidden_display_name("Theirs").unwrap();
    peer.set_hidden_color("#ff8800").unwrap();

    sync(&harness);
    let local = harness.local();
    assert_eq!(local.display_name().unwrap().as_deref(), Some("Theirs"));
    assert_eq!(local.color().unwrap().as_deref(), Some("#ff8800"));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn pushed_components_reach_another_client(contacts in prop::collection::vec(new_contact_strategy(), 0..6)) {
        let writer: PairHarness<Contact> = PairHarness::new(PATH);
        for contact in &contacts {
            writer.create_local(contact.clone());
        }
        let report = sync(&writer);
        prop_assert!(report.checkpointed());

        let mut reader: PairHarness<Contact> = PairHarness::new(PATH);
        reader.server = writer.server.clone();
        let report = sync(&reader);
        prop_assert!(report.checkpointed());
        prop_assert_eq!(report.statistics.inserts, contacts.len() as u64);

        let mut written: Vec<Contact> = writer.local_components().into_iter().map(|c| c.component).collect();
        let mut read: Vec<Contact> = reader.local_components().into_iter().map(|c| c.component).collect();
        written.sort_by(|a, b| a.uid.cmp(&b.uid));
        read.sort_by(|a, b| a.uid.cmp(&b.uid));
        prop_assert_eq!(written, read);
    }

    #[test]
    fn pulled_collection_is_stable(contacts in contacts_strategy(0..8)) {
        let harness: PairHarness<Contact> = PairHarness::new(PATH);
        for contact in &contacts {
            harness.seed_remote(contact);
        }
        let first = sync(&harness);
        prop_assert_eq!(first.statistics.inserts, contacts.len() as u64);

        let writes = harness.server.write_count();
        let second = sync(&harness);
        prop_assert!(!second.statistics.has_changes());
        prop_assert_eq!(harness.server.write_count(), writes);
        prop_assert_eq!(harness.local_components().len(), contacts.len());
    }
}
