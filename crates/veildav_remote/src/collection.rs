//! The remote collection contract driven by the sync worker.

use crate::error::{RemoteError, RemoteResult};
use std::collections::HashMap;
use veildav_core::{CTag, Component, ComponentETagPair, ETag};

/// Result of a batch read: the components that could be read, and one error
/// per component that could not.
#[derive(Debug)]
pub struct HiddenBatch<C> {
    /// Successfully revealed components with their ETags.
    pub components: Vec<ComponentETagPair<C>>,
    /// Per-item [`RemoteError::InvalidComponent`] and
    /// [`RemoteError::InvalidMac`] failures.
    pub failures: Vec<RemoteError>,
}

impl<C> Default for HiddenBatch<C> {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// One remote collection as seen by the sync worker: components go in and
/// come out as plaintext records, whatever the server stores.
///
/// Collection properties are fetched once and cached until
/// [`refresh_properties`](Self::refresh_properties) or a property write.
pub trait RemoteCollection<C: Component>: Send {
    /// Collection path.
    fn path(&self) -> &str;

    /// Creates the collection if missing and marks it managed, seeding the
    /// hidden display name.
    fn ensure_collection(&mut self, display_name: &str) -> RemoteResult<()>;

    /// Drops cached properties and fetches them again.
    fn refresh_properties(&mut self) -> RemoteResult<()>;

    /// The collection CTag.
    fn ctag(&mut self) -> RemoteResult<Option<CTag>>;

    /// The real display name.
    fn hidden_display_name(&mut self) -> RemoteResult<Option<String>>;

    /// Stores the real display name.
    fn set_hidden_display_name(&mut self, name: &str) -> RemoteResult<()>;

    /// The real color.
    fn hidden_color(&mut self) -> RemoteResult<Option<String>>;

    /// Stores the real color.
    fn set_hidden_color(&mut self, color: &str) -> RemoteResult<()>;

    /// Returns true if this client manages the collection.
    fn is_managed(&mut self) -> RemoteResult<bool>;

    /// Marks the collection managed by this client.
    fn mark_managed(&mut self) -> RemoteResult<()>;

    /// `uid -> etag` for every member. Fails with
    /// [`RemoteError::DuplicateUid`] if the server lists a UID twice.
    fn list_etags(&self) -> RemoteResult<HashMap<String, ETag>>;

    /// Fetches and reveals one component.
    fn get_hidden_component(&self, uid: &str) -> RemoteResult<ComponentETagPair<C>>;

    /// Fetches and reveals several components in one round trip.
    fn get_hidden_components(&self, uids: &[String]) -> RemoteResult<HiddenBatch<C>>;

    /// Fetches and reveals every component.
    fn get_all_hidden_components(&self) -> RemoteResult<HiddenBatch<C>>;

    /// Hides and creates a component, without precondition.
    fn add_hidden_component(&self, component: &C) -> RemoteResult<Option<ETag>>;

    /// Hides and replaces a component if the server still holds `etag`.
    fn update_hidden_component(&self, component: &C, etag: &ETag) -> RemoteResult<Option<ETag>>;

    /// Deletes a component.
    fn remove_component(&self, uid: &str, etag: Option<&ETag>) -> RemoteResult<()>;

    /// Closes the underlying connection.
    fn close(&mut self) -> RemoteResult<()>;
}
