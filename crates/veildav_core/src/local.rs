//! The local collection contract.

use crate::component::Component;
use crate::error::CoreResult;
use crate::types::{CTag, ETag, LocalId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A component as held by the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalComponent<C> {
    /// Local identifier.
    pub id: LocalId,
    /// The record.
    pub component: C,
    /// Last ETag confirmed by the server.
    pub etag: Option<ETag>,
    /// Changed locally since the last confirmed push.
    pub dirty: bool,
    /// Deleted locally, awaiting remote deletion.
    pub deleted: bool,
}

impl<C: Component> LocalComponent<C> {
    /// The component UID, if assigned.
    pub fn uid(&self) -> Option<&str> {
        self.component.uid()
    }

    /// Dirty and never given a UID.
    pub fn is_new(&self) -> bool {
        self.dirty && !self.deleted && self.component.uid().is_none()
    }

    /// Dirty with a UID.
    pub fn is_updated(&self) -> bool {
        self.dirty && !self.deleted && self.component.uid().is_some()
    }
}

/// One local collection, as driven by the sync worker.
///
/// Mutations are staged into the collection's pending queue and take effect
/// only on [`commit`](Self::commit), all together or not at all. Every
/// operation is scoped to this collection.
pub trait LocalCollection<C: Component>: Send {
    /// Collection path, shared with the remote side.
    fn path(&self) -> &str;

    /// Ids of components that are dirty and have no UID.
    fn new_ids(&self) -> CoreResult<Vec<LocalId>>;

    /// Ids of components that are dirty and have a UID.
    fn updated_ids(&self) -> CoreResult<Vec<LocalId>>;

    /// Ids of components flagged deleted.
    fn deleted_ids(&self) -> CoreResult<Vec<LocalId>>;

    /// Ids of every component.
    fn all_ids(&self) -> CoreResult<Vec<LocalId>>;

    /// `uid -> (id, etag)` for every component that has a UID.
    fn uid_index(&self) -> CoreResult<HashMap<String, (LocalId, Option<ETag>)>>;

    /// Fetches a component by local id.
    fn component_by_id(&self, id: LocalId) -> CoreResult<Option<LocalComponent<C>>>;

    /// Fetches a component by UID.
    fn component_by_uid(&self, uid: &str) -> CoreResult<Option<LocalComponent<C>>>;

    /// Stages storing a component received from the server.
    fn queue_add(&mut self, component: C, etag: Option<ETag>) -> CoreResult<()>;

    /// Stages replacing a component with the server's version.
    fn queue_update(&mut self, id: LocalId, component: C, etag: Option<ETag>) -> CoreResult<()>;

    /// Stages removing a component.
    fn queue_remove(&mut self, id: LocalId) -> CoreResult<()>;

    /// Stages assigning a UID to a new component.
    fn queue_assign_uid(&mut self, id: LocalId, uid: String) -> CoreResult<()>;

    /// Stages clearing the dirty flag, recording the confirmed ETag.
    fn queue_clear_dirty(&mut self, id: LocalId, etag: Option<ETag>) -> CoreResult<()>;

    /// Stages clearing the UID so the component is retried as new.
    fn queue_mark_for_retry(&mut self, id: LocalId) -> CoreResult<()>;

    /// Number of staged operations.
    fn pending_operations(&self) -> usize;

    /// Returns true if the pending queue reached its bounds.
    fn is_queue_full(&self) -> bool;

    /// Drops staged operations without applying them.
    fn discard_pending(&mut self);

    /// Applies the staged operations atomically and returns how many were
    /// applied. The queue is empty afterwards, whatever the outcome.
    fn commit(&mut self) -> CoreResult<usize>;

    /// The CTag recorded at the last successful pass.
    fn ctag(&self) -> CoreResult<Option<CTag>>;

    /// Records the CTag.
    fn set_ctag(&mut self, ctag: &CTag) -> CoreResult<()>;

    /// The local display name.
    fn display_name(&self) -> CoreResult<Option<String>>;

    /// Sets the local display name.
    fn set_display_name(&mut self, name: Option<&str>) -> CoreResult<()>;

    /// The local color.
    fn color(&self) -> CoreResult<Option<String>>;

    /// Sets the local color.
    fn set_color(&mut self, color: Option<&str>) -> CoreResult<()>;

    /// Returns true if any component is new, dirty or deleted.
    fn has_local_changes(&self) -> CoreResult<bool>;
}

/// The set of local collections of one data domain.
pub trait LocalAccount<C: Component>: Send + Sync {
    /// Paths of every local collection.
    fn collection_paths(&self) -> CoreResult<Vec<String>>;

    /// Creates an empty collection.
    fn create_collection(&self, path: &str) -> CoreResult<()>;

    /// Drops a collection with its components and sync state.
    fn drop_collection(&self, path: &str) -> CoreResult<()>;

    /// Opens a handle on a collection. Each handle owns its own queue.
    fn open(&self, path: &str) -> CoreResult<Box<dyn LocalCollection<C>>>;
}
