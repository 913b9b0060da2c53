//! Transactional local store.
//!
//! [`LocalStore`] stands in for the platform record store: it holds any number
//! of collections, hands out [`StoreCollection`] handles that stage mutations
//! in their own [`PendingOperationQueue`], and applies a queue as one
//! all-or-nothing batch. With a backing file, every commit rewrites the
//! snapshot atomically before the new state becomes visible.

use crate::component::{encode_component, Component};
use crate::error::{CoreError, CoreResult};
use crate::local::{LocalAccount, LocalCollection, LocalComponent};
use crate::persist::{read_json, write_json_atomically};
use crate::queue::{PendingOperation, PendingOperationQueue, QueueLimits};
use crate::state::{StateKey, SyncStateStore};
use crate::types::{CTag, ETag, LocalId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCollection<C> {
    components: BTreeMap<u64, LocalComponent<C>>,
}

impl<C: Component> StoredCollection<C> {
    fn empty() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    fn find_uid(&self, uid: &str) -> Option<&LocalComponent<C>> {
        self.components.values().find(|c| c.uid() == Some(uid))
    }

    fn get_mut(&mut self, id: LocalId) -> CoreResult<&mut LocalComponent<C>> {
        self.components
            .get_mut(&id.as_u64())
            .ok_or(CoreError::ComponentNotFound { id: id.as_u64() })
    }

    fn ensure_uid_free(&self, path: &str, uid: &str, owner: Option<LocalId>) -> CoreResult<()> {
        match self.find_uid(uid) {
            Some(existing) if Some(existing.id) != owner => Err(CoreError::DuplicateUid {
                path: path.to_string(),
                uid: uid.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn ids_where(&self, predicate: impl Fn(&LocalComponent<C>) -> bool) -> Vec<LocalId> {
        self.components
            .values()
            .filter(|c| predicate(c))
            .map(|c| c.id)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot<C> {
    next_id: u64,
    collections: BTreeMap<String, StoredCollection<C>>,
}

impl<C> Default for Snapshot<C> {
    fn default() -> Self {
        Self {
            next_id: 1,
            collections: BTreeMap::new(),
        }
    }
}

struct Shared<C> {
    data: RwLock<Snapshot<C>>,
    file: Option<PathBuf>,
    state: Arc<dyn SyncStateStore>,
    limits: QueueLimits,
    fail_next_commit: AtomicBool,
}

/// A transactional store of local collections.
///
/// Cloning is cheap; clones share the same data.
pub struct LocalStore<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for LocalStore<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Component> LocalStore<C> {
    /// Creates an empty in-memory store with default queue limits.
    pub fn in_memory(state: Arc<dyn SyncStateStore>) -> Self {
        Self::with_limits(state, QueueLimits::default())
    }

    /// Creates an empty in-memory store.
    pub fn with_limits(state: Arc<dyn SyncStateStore>, limits: QueueLimits) -> Self {
        Self::build(Snapshot::default(), None, state, limits)
    }

    /// Opens a store persisted at `file`, creating it on first commit.
    pub fn open_file(
        file: impl AsRef<Path>,
        state: Arc<dyn SyncStateStore>,
        limits: QueueLimits,
    ) -> CoreResult<Self> {
        let file = file.as_ref().to_path_buf();
        let snapshot = read_json(&file)?.unwrap_or_default();
        Ok(Self::build(snapshot, Some(file), state, limits))
    }

    fn build(
        snapshot: Snapshot<C>,
        file: Option<PathBuf>,
        state: Arc<dyn SyncStateStore>,
        limits: QueueLimits,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(snapshot),
                file,
                state,
                limits,
                fail_next_commit: AtomicBool::new(false),
            }),
        }
    }

    /// The sync state store shared by every collection of this store.
    pub fn state(&self) -> &Arc<dyn SyncStateStore> {
        &self.shared.state
    }

    /// Makes the next non-empty commit fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Creates a new, dirty component as a local editor would.
    pub fn create_component(&self, path: &str, component: C) -> CoreResult<LocalId> {
        component.validate()?;
        self.mutate(path, |collection, next_id| {
            if let Some(uid) = component.uid() {
                collection.ensure_uid_free(path, uid, None)?;
            }
            let id = LocalId::new(*next_id);
            *next_id += 1;
            collection.components.insert(
                id.as_u64(),
                LocalComponent {
                    id,
                    component,
                    etag: None,
                    dirty: true,
                    deleted: false,
                },
            );
            Ok(id)
        })
    }

    /// Replaces a component's content and marks it dirty.
    pub fn edit_component(&self, path: &str, id: LocalId, mut component: C) -> CoreResult<()> {
        component.validate()?;
        self.mutate(path, |collection, _| {
            let entry = collection.get_mut(id)?;
            if component.uid().is_none() {
                component.set_uid(entry.uid().map(str::to_string));
            }
            entry.component = component;
            entry.dirty = true;
            Ok(())
        })
    }

    /// Flags a component deleted; it is removed once the server confirms.
    pub fn flag_deleted(&self, path: &str, id: LocalId) -> CoreResult<()> {
        self.mutate(path, |collection, _| {
            collection.get_mut(id)?.deleted = true;
            Ok(())
        })
    }

    /// Every component of a collection, in local id order.
    pub fn components(&self, path: &str) -> CoreResult<Vec<LocalComponent<C>>> {
        self.read(path, |collection| collection.components.values().cloned().collect())
    }

    /// Finds a component by UID.
    pub fn find_by_uid(&self, path: &str, uid: &str) -> CoreResult<Option<LocalComponent<C>>> {
        self.read(path, |collection| collection.find_uid(uid).cloned())
    }

    fn read<R>(&self, path: &str, f: impl FnOnce(&StoredCollection<C>) -> R) -> CoreResult<R> {
        let data = self.shared.data.read();
        let collection = data
            .collections
            .get(path)
            .ok_or_else(|| CoreError::CollectionNotFound {
                path: path.to_string(),
            })?;
        Ok(f(collection))
    }

    /// Applies `f` to a copy of the collection and installs the copy only if
    /// `f` and persistence both succeed.
    fn mutate<R>(
        &self,
        path: &str,
        f: impl FnOnce(&mut StoredCollection<C>, &mut u64) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut data = self.shared.data.write();
        let mut collection =
            data.collections
                .get(path)
                .cloned()
                .ok_or_else(|| CoreError::CollectionNotFound {
                    path: path.to_string(),
                })?;
        let mut next_id = data.next_id;

        let result = f(&mut collection, &mut next_id)?;

        let previous = data.collections.insert(path.to_string(), collection);
        let previous_next_id = std::mem::replace(&mut data.next_id, next_id);
        if let Err(err) = self.persist(&data) {
            if let Some(previous) = previous {
                data.collections.insert(path.to_string(), previous);
            }
            data.next_id = previous_next_id;
            return Err(err);
        }
        Ok(result)
    }

    fn persist(&self, snapshot: &Snapshot<C>) -> CoreResult<()> {
        match &self.shared.file {
            Some(file) => write_json_atomically(file, snapshot),
            None => Ok(()),
        }
    }
}

impl<C: Component> LocalAccount<C> for LocalStore<C> {
    fn collection_paths(&self) -> CoreResult<Vec<String>> {
        Ok(self.shared.data.read().collections.keys().cloned().collect())
    }

    fn create_collection(&self, path: &str) -> CoreResult<()> {
        let mut data = self.shared.data.write();
        if data.collections.contains_key(path) {
            return Ok(());
        }
        data.collections
            .insert(path.to_string(), StoredCollection::empty());
        if let Err(err) = self.persist(&data) {
            data.collections.remove(path);
            return Err(err);
        }
        debug!(path, "created local collection");
        Ok(())
    }

    fn drop_collection(&self, path: &str) -> CoreResult<()> {
        let mut data = self.shared.data.write();
        if let Some(previous) = data.collections.remove(path) {
            if let Err(err) = self.persist(&data) {
                data.collections.insert(path.to_string(), previous);
                return Err(err);
            }
        }
        drop(data);
        self.shared.state.remove_collection(path)?;
        debug!(path, "dropped local collection");
        Ok(())
    }

    fn open(&self, path: &str) -> CoreResult<Box<dyn LocalCollection<C>>> {
        self.read(path, |_| ())?;
        Ok(Box::new(StoreCollection::new(self.clone(), path)))
    }
}

/// A handle on one collection of a [`LocalStore`].
///
/// The handle owns its pending queue; staged operations are invisible to
/// other handles until committed.
pub struct StoreCollection<C> {
    store: LocalStore<C>,
    path: String,
    queue: PendingOperationQueue<C>,
}

impl<C: Component> StoreCollection<C> {
    /// Creates a handle on `path`.
    pub fn new(store: LocalStore<C>, path: impl Into<String>) -> Self {
        let limits = store.shared.limits;
        Self {
            store,
            path: path.into(),
            queue: PendingOperationQueue::new(limits),
        }
    }

    fn stage(&mut self, operation: PendingOperation<C>, bytes: usize) -> CoreResult<()> {
        self.queue.push(operation, bytes)
    }

    fn queued_uid(&self, uid: &str) -> bool {
        self.queue.iter().any(|op| match op {
            PendingOperation::Add { component, .. } => component.uid() == Some(uid),
            PendingOperation::AssignUid { uid: assigned, .. } => assigned == uid,
            _ => false,
        })
    }

    fn state_get(&self, key: StateKey) -> CoreResult<Option<String>> {
        self.store.shared.state.get(&self.path, key)
    }

    fn state_set(&self, key: StateKey, value: Option<&str>) -> CoreResult<()> {
        self.store.shared.state.set(&self.path, key, value)
    }
}

fn apply_operation<C: Component>(
    path: &str,
    collection: &mut StoredCollection<C>,
    next_id: &mut u64,
    operation: PendingOperation<C>,
) -> CoreResult<()> {
    match operation {
        PendingOperation::Add { component, etag } => {
            if let Some(uid) = component.uid() {
                collection.ensure_uid_free(path, uid, None)?;
            }
            let id = LocalId::new(*next_id);
            *next_id += 1;
            collection.components.insert(
                id.as_u64(),
                LocalComponent {
                    id,
                    component,
                    etag,
                    dirty: false,
                    deleted: false,
                },
            );
        }
        PendingOperation::Update {
            id,
            component,
            etag,
        } => {
            if let Some(uid) = component.uid() {
                collection.ensure_uid_free(path, uid, Some(id))?;
            }
            let entry = collection.get_mut(id)?;
            entry.component = component;
            entry.etag = etag;
            entry.dirty = false;
            entry.deleted = false;
        }
        PendingOperation::Remove { id } => {
            collection
                .components
                .remove(&id.as_u64())
                .ok_or(CoreError::ComponentNotFound { id: id.as_u64() })?;
        }
        PendingOperation::AssignUid { id, uid } => {
            collection.ensure_uid_free(path, &uid, Some(id))?;
            collection.get_mut(id)?.component.set_uid(Some(uid));
        }
        PendingOperation::ClearDirty { id, etag } => {
            let entry = collection.get_mut(id)?;
            entry.dirty = false;
            if etag.is_some() {
                entry.etag = etag;
            }
        }
        PendingOperation::MarkForRetry { id } => {
            let entry = collection.get_mut(id)?;
            entry.component.set_uid(None);
            entry.etag = None;
            entry.dirty = true;
        }
    }
    Ok(())
}

impl<C: Component> LocalCollection<C> for StoreCollection<C> {
    fn path(&self) -> &str {
        &self.path
    }

    fn new_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.store
            .read(&self.path, |c| c.ids_where(LocalComponent::is_new))
    }

    fn updated_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.store
            .read(&self.path, |c| c.ids_where(LocalComponent::is_updated))
    }

    fn deleted_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.store.read(&self.path, |c| c.ids_where(|lc| lc.deleted))
    }

    fn all_ids(&self) -> CoreResult<Vec<LocalId>> {
        self.store.read(&self.path, |c| c.ids_where(|_| true))
    }

    fn uid_index(&self) -> CoreResult<HashMap<String, (LocalId, Option<ETag>)>> {
        self.store.read(&self.path, |c| {
            c.components
                .values()
                .filter_map(|lc| {
                    lc.uid()
                        .map(|uid| (uid.to_string(), (lc.id, lc.etag.clone())))
                })
                .collect()
        })
    }

    fn component_by_id(&self, id: LocalId) -> CoreResult<Option<LocalComponent<C>>> {
        self.store
            .read(&self.path, |c| c.components.get(&id.as_u64()).cloned())
    }

    fn component_by_uid(&self, uid: &str) -> CoreResult<Option<LocalComponent<C>>> {
        self.store.find_by_uid(&self.path, uid)
    }

    fn queue_add(&mut self, component: C, etag: Option<ETag>) -> CoreResult<()> {
        component.validate()?;
        if let Some(parent) = component.depends_on() {
            let committed = self
                .store
                .read(&self.path, |c| c.find_uid(parent).is_some())?;
            if !committed && !self.queued_uid(parent) {
                return Err(CoreError::MissingDependency {
                    uid: component.uid().unwrap_or_default().to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        let bytes = encode_component(&component)?.len();
        self.stage(PendingOperation::Add { component, etag }, bytes)
    }

    fn queue_update(&mut self, id: LocalId, component: C, etag: Option<ETag>) -> CoreResult<()> {
        component.validate()?;
        let bytes = encode_component(&component)?.len();
        self.stage(
            PendingOperation::Update {
                id,
                component,
                etag,
            },
            bytes,
        )
    }

    fn queue_remove(&mut self, id: LocalId) -> CoreResult<()> {
        self.stage(PendingOperation::Remove { id }, 0)
    }

    fn queue_assign_uid(&mut self, id: LocalId, uid: String) -> CoreResult<()> {
        self.stage(PendingOperation::AssignUid { id, uid }, 0)
    }

    fn queue_clear_dirty(&mut self, id: LocalId, etag: Option<ETag>) -> CoreResult<()> {
        self.stage(PendingOperation::ClearDirty { id, etag }, 0)
    }

    fn queue_mark_for_retry(&mut self, id: LocalId) -> CoreResult<()> {
        self.stage(PendingOperation::MarkForRetry { id }, 0)
    }

    fn pending_operations(&self) -> usize {
        self.queue.len()
    }

    fn is_queue_full(&self) -> bool {
        self.queue.is_full()
    }

    fn discard_pending(&mut self) {
        self.queue.clear();
    }

    fn commit(&mut self) -> CoreResult<usize> {
        let operations = self.queue.take();
        if operations.is_empty() {
            return Ok(0);
        }
        let count = operations.len();

        if self.store.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            warn!(path = %self.path, count, "local store refused batch");
            return Err(CoreError::commit_failed("store refused the batch"));
        }

        let path = self.path.clone();
        self.store.mutate(&path, |collection, next_id| {
            for operation in operations {
                apply_operation(&path, collection, next_id, operation)?;
            }
            Ok(())
        })?;

        debug!(path = %self.path, applied = count, "committed local batch");
        Ok(count)
    }

    fn ctag(&self) -> CoreResult<Option<CTag>> {
        Ok(self.state_get(StateKey::CTag)?.map(CTag::new))
    }

    fn set_ctag(&mut self, ctag: &CTag) -> CoreResult<()> {
        self.state_set(StateKey::CTag, Some(ctag.as_str()))
    }

    fn display_name(&self) -> CoreResult<Option<String>> {
        self.state_get(StateKey::DisplayName)
    }

    fn set_display_name(&mut self, name: Option<&str>) -> CoreResult<()> {
        self.state_set(StateKey::DisplayName, name)
    }

    fn color(&self) -> CoreResult<Option<String>> {
        self.state_get(StateKey::Color)
    }

    fn set_color(&mut self, color: Option<&str>) -> CoreResult<()> {
        self.state_set(StateKey::Color, color)
    }

    fn has_local_changes(&self) -> CoreResult<bool> {
        self.store
            .read(&self.path, |c| c.components.values().any(|lc| lc.dirty || lc.deleted))
    }
}
