//! Transport layer abstraction for remote collections.

use crate::error::RemoteResult;
use std::collections::BTreeMap;
use veildav_core::{ETag, ExposedComponent};

/// Property holding the collection CTag.
pub const CTAG_PROPERTY: &str = "getctag";

/// Property holding the display name shown by the server.
pub const DISPLAY_NAME_PROPERTY: &str = "displayname";

/// Collection properties as returned by the server.
pub type CollectionProperties = BTreeMap<String, String>;

/// One plain remote collection.
///
/// This trait abstracts the wire protocol; it moves exposed records and
/// never sees plaintext of hidden ones.
pub trait RemoteTransport: Send + Sync {
    /// Path of the collection.
    fn path(&self) -> &str;

    /// Returns true if the collection exists on the server.
    fn exists(&self) -> RemoteResult<bool>;

    /// Creates the collection. Creating an existing collection succeeds.
    fn create_collection(&self) -> RemoteResult<()>;

    /// Fetches every collection property.
    fn fetch_properties(&self) -> RemoteResult<CollectionProperties>;

    /// Sets a property; `None` removes it.
    fn set_property(&self, name: &str, value: Option<&str>) -> RemoteResult<()>;

    /// Lists `(uid, etag)` for every member, as the server reports it.
    fn list_etags(&self) -> RemoteResult<Vec<(String, ETag)>>;

    /// Fetches one member.
    fn get_component(&self, uid: &str) -> RemoteResult<(ExposedComponent, ETag)>;

    /// Fetches several members in one round trip; missing ones are omitted.
    fn get_components(&self, uids: &[String]) -> RemoteResult<Vec<(ExposedComponent, ETag)>>;

    /// Writes a member. With `if_match` the write only succeeds if the
    /// stored ETag matches. Returns the new ETag when the server reports one.
    fn put_component(
        &self,
        component: &ExposedComponent,
        if_match: Option<&ETag>,
    ) -> RemoteResult<Option<ETag>>;

    /// Deletes a member.
    fn delete_component(&self, uid: &str, if_match: Option<&ETag>) -> RemoteResult<()>;

    /// Closes the connection. Later calls fail.
    fn close(&self) -> RemoteResult<()>;
}

/// The remote collections of one data domain.
pub trait RemoteAccount: Send + Sync {
    /// Paths of every remote collection of this domain.
    fn collection_paths(&self) -> RemoteResult<Vec<String>>;

    /// Opens a transport on a collection, which need not exist yet.
    fn open(&self, path: &str) -> RemoteResult<Box<dyn RemoteTransport>>;

    /// Releases pooled connections once a run is over.
    fn release_connections(&self);
}

impl<T: RemoteTransport + ?Sized> RemoteTransport for Box<T> {
    fn path(&self) -> &str {
        (**self).path()
    }

    fn exists(&self) -> RemoteResult<bool> {
        (**self).exists()
    }

    fn create_collection(&self) -> RemoteResult<()> {
        (**self).create_collection()
    }

    fn fetch_properties(&self) -> RemoteResult<CollectionProperties> {
        (**self).fetch_properties()
    }

    fn set_property(&self, name: &str, value: Option<&str>) -> RemoteResult<()> {
        (**self).set_property(name, value)
    }

    fn list_etags(&self) -> RemoteResult<Vec<(String, ETag)>> {
        (**self).list_etags()
    }

    fn get_component(&self, uid: &str) -> RemoteResult<(ExposedComponent, ETag)> {
        (**self).get_component(uid)
    }

    fn get_components(&self, uids: &[String]) -> RemoteResult<Vec<(ExposedComponent, ETag)>> {
        (**self).get_components(uids)
    }

    fn put_component(
        &self,
        component: &ExposedComponent,
        if_match: Option<&ETag>,
    ) -> RemoteResult<Option<ETag>> {
        (**self).put_component(component, if_match)
    }

    fn delete_component(&self, uid: &str, if_match: Option<&ETag>) -> RemoteResult<()> {
        (**self).delete_component(uid, if_match)
    }

    fn close(&self) -> RemoteResult<()> {
        (**self).close()
    }
}
