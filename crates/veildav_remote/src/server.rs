//! In-memory remote server.
//!
//! [`MemoryServer`] plays the part of a CardDAV/CalDAV server for tests and
//! the command line tool: it stores exposed records per collection path,
//! derives ETags from the stored representation, bumps a collection's CTag on
//! every change and can inject the faults a real server produces.

use crate::error::{RemoteError, RemoteResult};
use crate::transport::{CollectionProperties, RemoteAccount, RemoteTransport, CTAG_PROPERTY};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use veildav_core::persist::{read_json, write_json_atomically};
use veildav_core::{ETag, ExposedComponent};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMember {
    exposed: ExposedComponent,
    etag: ETag,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCollection {
    revision: u64,
    properties: BTreeMap<String, String>,
    members: BTreeMap<String, StoredMember>,
}

impl StoredCollection {
    fn ctag(&self) -> String {
        format!("ctag-{}", self.revision)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServerData {
    revision: u64,
    collections: BTreeMap<String, StoredCollection>,
}

impl ServerData {
    fn collection(&self, path: &str) -> RemoteResult<&StoredCollection> {
        self.collections
            .get(path)
            .ok_or_else(|| RemoteError::not_found(path))
    }

    /// Returns the collection with its CTag already bumped.
    fn changing(&mut self, path: &str) -> RemoteResult<&mut StoredCollection> {
        let collection = self
            .collections
            .get_mut(path)
            .ok_or_else(|| RemoteError::not_found(path))?;
        self.revision += 1;
        collection.revision = self.revision;
        Ok(collection)
    }
}

#[derive(Debug, Default)]
struct Faults {
    unauthorized: bool,
    payment_required: bool,
    transient_failures: u32,
    rejected_uids: HashSet<String>,
    unpaid_uids: HashSet<String>,
    flaky_uids: HashSet<String>,
    duplicated_uids: HashSet<String>,
    omit_put_etags: bool,
    failing_creates: bool,
    latency: Duration,
}

#[derive(Debug)]
struct Inner {
    data: RwLock<ServerData>,
    file: Option<PathBuf>,
    faults: Mutex<Faults>,
    writes: AtomicU64,
    connections: AtomicUsize,
    releases: AtomicU64,
}

/// Computes the ETag of a stored representation.
pub fn etag_of(exposed: &ExposedComponent) -> RemoteResult<ETag> {
    let bytes = serde_json::to_vec(exposed)
        .map_err(|e| RemoteError::invalid_component(exposed.uid.clone(), e, false))?;
    let digest = Sha256::digest(&bytes);
    Ok(ETag::new(format!("\"{}\"", hex::encode(&digest[..16]))))
}

/// A shared in-memory server holding many collections.
///
/// Cloning is cheap; clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    inner: Arc<Inner>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::build(ServerData::default(), None)
    }

    /// Opens a server persisted at `file`; every write rewrites the file.
    pub fn open_file(file: impl AsRef<Path>) -> RemoteResult<Self> {
        let file = file.as_ref().to_path_buf();
        let data = read_json(&file)
            .map_err(|e| RemoteError::transport_fatal(e.to_string()))?
            .unwrap_or_default();
        Ok(Self::build(data, Some(file)))
    }

    fn build(data: ServerData, file: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(data),
                file,
                faults: Mutex::new(Faults::default()),
                writes: AtomicU64::new(0),
                connections: AtomicUsize::new(0),
                releases: AtomicU64::new(0),
            }),
        }
    }

    /// Opens a connection on one collection, which need not exist yet.
    pub fn open(&self, path: &str) -> ServerCollection {
        self.inner.connections.fetch_add(1, Ordering::SeqCst);
        ServerCollection {
            server: self.clone(),
            path: path.to_string(),
            closed: AtomicBool::new(false),
        }
    }

    /// An account exposing the collections whose path starts with `prefix`.
    pub fn account(&self, prefix: impl Into<String>) -> ServerAccount {
        ServerAccount {
            server: self.clone(),
            prefix: prefix.into(),
        }
    }

    /// Every collection path.
    pub fn paths(&self) -> Vec<String> {
        self.inner.data.read().collections.keys().cloned().collect()
    }

    /// The stored representation of a member, bypassing faults.
    pub fn stored(&self, path: &str, uid: &str) -> Option<(ExposedComponent, ETag)> {
        let data = self.inner.data.read();
        let member = data.collections.get(path)?.members.get(uid)?;
        Some((member.exposed.clone(), member.etag.clone()))
    }

    /// Every stored member of a collection, bypassing faults.
    pub fn members(&self, path: &str) -> Vec<(ExposedComponent, ETag)> {
        let data = self.inner.data.read();
        data.collections
            .get(path)
            .map(|c| {
                c.members
                    .values()
                    .map(|m| (m.exposed.clone(), m.etag.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Collection properties including the CTag, bypassing faults.
    pub fn properties(&self, path: &str) -> Option<CollectionProperties> {
        let data = self.inner.data.read();
        data.collections.get(path).map(properties_of)
    }

    /// Stores a member directly, as another client would.
    pub fn store_raw(&self, path: &str, exposed: ExposedComponent) -> RemoteResult<ETag> {
        let etag = etag_of(&exposed)?;
        self.mutate(|data| {
            data.collections.entry(path.to_string()).or_default();
            data.changing(path)?.members.insert(
                exposed.uid.clone(),
                StoredMember {
                    exposed,
                    etag: etag.clone(),
                },
            );
            Ok(())
        })?;
        Ok(etag)
    }

    /// Removes a member directly, as another client would.
    pub fn remove_raw(&self, path: &str, uid: &str) -> RemoteResult<()> {
        self.mutate(|data| {
            data.changing(path)?
                .members
                .remove(uid)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found(uid))
        })
    }

    /// Deletes a whole collection.
    pub fn drop_collection(&self, path: &str) -> RemoteResult<()> {
        self.mutate(|data| {
            data.collections
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found(path))
        })
    }

    /// Refuses every request with 401 while set.
    pub fn set_unauthorized(&self, refused: bool) {
        self.inner.faults.lock().unauthorized = refused;
    }

    /// Answers every request with 402 while set.
    pub fn set_payment_required(&self, required: bool) {
        self.inner.faults.lock().payment_required = required;
    }

    /// Fails the next `count` requests with a retryable transport error.
    pub fn fail_next_requests(&self, count: u32) {
        self.inner.faults.lock().transient_failures = count;
    }

    /// Rejects every write of `uid` as structurally invalid.
    pub fn reject_puts_of(&self, uid: impl Into<String>) {
        self.inner.faults.lock().rejected_uids.insert(uid.into());
    }

    /// Answers every write of `uid` with 402.
    pub fn require_payment_for(&self, uid: impl Into<String>) {
        self.inner.faults.lock().unpaid_uids.insert(uid.into());
    }

    /// Fails every write of `uid` with a retryable transport error.
    pub fn fail_puts_of(&self, uid: impl Into<String>) {
        self.inner.faults.lock().flaky_uids.insert(uid.into());
    }

    /// Reports `uid` twice in every listing.
    pub fn duplicate_in_listing(&self, uid: impl Into<String>) {
        self.inner.faults.lock().duplicated_uids.insert(uid.into());
    }

    /// Fails every unconditional write with a retryable transport error
    /// while set.
    pub fn set_creates_failing(&self, failing: bool) {
        self.inner.faults.lock().failing_creates = failing;
    }

    /// Stops reporting new ETags on writes while set.
    pub fn omit_put_etags(&self, omit: bool) {
        self.inner.faults.lock().omit_put_etags = omit;
    }

    /// Delays every request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.faults.lock().latency = latency;
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = Faults::default();
    }

    /// Number of successful writes (puts, deletes and property changes).
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Number of times an account released its connections.
    pub fn release_count(&self) -> u64 {
        self.inner.releases.load(Ordering::SeqCst)
    }

    fn admit(&self) -> RemoteResult<()> {
        let latency = self.inner.faults.lock().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let mut faults = self.inner.faults.lock();
        if faults.unauthorized {
            return Err(RemoteError::Unauthorized("credentials refused".into()));
        }
        if faults.payment_required {
            return Err(RemoteError::PaymentRequired);
        }
        if faults.transient_failures > 0 {
            faults.transient_failures -= 1;
            return Err(RemoteError::transport_retryable("503 service unavailable"));
        }
        Ok(())
    }

    fn admit_write(&self, uid: &str, conditional: bool) -> RemoteResult<bool> {
        let faults = self.inner.faults.lock();
        if faults.failing_creates && !conditional {
            return Err(RemoteError::transport_retryable("504 gateway timeout"));
        }
        if faults.rejected_uids.contains(uid) {
            return Err(RemoteError::Rejected {
                uid: uid.to_string(),
                message: "415 unsupported media type".into(),
            });
        }
        if faults.unpaid_uids.contains(uid) {
            return Err(RemoteError::PaymentRequired);
        }
        if faults.flaky_uids.contains(uid) {
            return Err(RemoteError::transport_retryable("502 bad gateway"));
        }
        Ok(!faults.omit_put_etags)
    }

    fn read<R>(&self, f: impl FnOnce(&ServerData) -> RemoteResult<R>) -> RemoteResult<R> {
        f(&self.inner.data.read())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ServerData) -> RemoteResult<R>) -> RemoteResult<R> {
        let mut data = self.inner.data.write();
        let result = f(&mut data)?;
        if let Some(file) = &self.inner.file {
            write_json_atomically(file, &*data)
                .map_err(|e| RemoteError::transport_fatal(e.to_string()))?;
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(result)
    }
}

fn properties_of(collection: &StoredCollection) -> CollectionProperties {
    let mut properties = collection.properties.clone();
    properties.insert(CTAG_PROPERTY.to_string(), collection.ctag());
    properties
}

/// A connection to one collection of a [`MemoryServer`].
#[derive(Debug)]
pub struct ServerCollection {
    server: MemoryServer,
    path: String,
    closed: AtomicBool,
}

impl ServerCollection {
    fn admit(&self) -> RemoteResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::transport_fatal("connection closed"));
        }
        self.server.admit()
    }
}

impl RemoteTransport for ServerCollection {
    fn path(&self) -> &str {
        &self.path
    }

    fn exists(&self) -> RemoteResult<bool> {
        self.admit()?;
        self.server
            .read(|data| Ok(data.collections.contains_key(&self.path)))
    }

    fn create_collection(&self) -> RemoteResult<()> {
        self.admit()?;
        let created = self.server.mutate(|data| {
            if data.collections.contains_key(&self.path) {
                return Ok(false);
            }
            data.collections
                .insert(self.path.clone(), StoredCollection::default());
            data.changing(&self.path).map(|_| true)
        })?;
        if !created {
            return Ok(());
        }
        debug!(path = %self.path, "server created collection");
        Ok(())
    }

    fn fetch_properties(&self) -> RemoteResult<CollectionProperties> {
        self.admit()?;
        self.server
            .read(|data| data.collection(&self.path).map(properties_of))
    }

    fn set_property(&self, name: &str, value: Option<&str>) -> RemoteResult<()> {
        self.admit()?;
        if name == CTAG_PROPERTY {
            return Err(RemoteError::Rejected {
                uid: self.path.clone(),
                message: "403 getctag is protected".into(),
            });
        }
        self.server.mutate(|data| {
            let collection = data.changing(&self.path)?;
            match value {
                Some(value) => collection
                    .properties
                    .insert(name.to_string(), value.to_string()),
                None => collection.properties.remove(name),
            };
            Ok(())
        })
    }

    fn list_etags(&self) -> RemoteResult<Vec<(String, ETag)>> {
        self.admit()?;
        let duplicated = self.server.inner.faults.lock().duplicated_uids.clone();
        self.server.read(|data| {
            let mut listing = Vec::new();
            for (uid, member) in &data.collection(&self.path)?.members {
                listing.push((uid.clone(), member.etag.clone()));
                if duplicated.contains(uid) {
                    listing.push((uid.clone(), member.etag.clone()));
                }
            }
            Ok(listing)
        })
    }

    fn get_component(&self, uid: &str) -> RemoteResult<(ExposedComponent, ETag)> {
        self.admit()?;
        self.server.read(|data| {
            data.collection(&self.path)?
                .members
                .get(uid)
                .map(|m| (m.exposed.clone(), m.etag.clone()))
                .ok_or_else(|| RemoteError::not_found(uid))
        })
    }

    fn get_components(&self, uids: &[String]) -> RemoteResult<Vec<(ExposedComponent, ETag)>> {
        self.admit()?;
        self.server.read(|data| {
            let collection = data.collection(&self.path)?;
            Ok(uids
                .iter()
                .filter_map(|uid| collection.members.get(uid))
                .map(|m| (m.exposed.clone(), m.etag.clone()))
                .collect())
        })
    }

    fn put_component(
        &self,
        component: &ExposedComponent,
        if_match: Option<&ETag>,
    ) -> RemoteResult<Option<ETag>> {
        self.admit()?;
        let uid = component.uid.as_str();
        let report_etag = self.server.admit_write(uid, if_match.is_some())?;
        if uid.is_empty() {
            return Err(RemoteError::Rejected {
                uid: String::new(),
                message: "400 missing uid".into(),
            });
        }
        let etag = etag_of(component)?;

        self.server.mutate(|data| {
            let current = data
                .collection(&self.path)?
                .members
                .get(uid)
                .map(|m| m.etag.clone());
            if let Some(expected) = if_match {
                if current.as_ref() != Some(expected) {
                    return Err(RemoteError::PreconditionFailed {
                        uid: uid.to_string(),
                    });
                }
            }
            data.changing(&self.path)?.members.insert(
                uid.to_string(),
                StoredMember {
                    exposed: component.clone(),
                    etag: etag.clone(),
                },
            );
            Ok(())
        })?;

        debug!(path = %self.path, uid, "server stored member");
        Ok(report_etag.then_some(etag))
    }

    fn delete_component(&self, uid: &str, if_match: Option<&ETag>) -> RemoteResult<()> {
        self.admit()?;
        self.server.mutate(|data| {
            let current = data
                .collection(&self.path)?
                .members
                .get(uid)
                .map(|m| m.etag.clone())
                .ok_or_else(|| RemoteError::not_found(uid))?;
            if let Some(expected) = if_match {
                if &current != expected {
                    return Err(RemoteError::PreconditionFailed {
                        uid: uid.to_string(),
                    });
                }
            }
            data.changing(&self.path)?.members.remove(uid);
            Ok(())
        })
    }

    fn close(&self) -> RemoteResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.server.inner.connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// The collections of a [`MemoryServer`] under one path prefix.
#[derive(Debug, Clone)]
pub struct ServerAccount {
    server: MemoryServer,
    prefix: String,
}

impl RemoteAccount for ServerAccount {
    fn collection_paths(&self) -> RemoteResult<Vec<String>> {
        self.server.admit()?;
        Ok(self
            .server
            .paths()
            .into_iter()
            .filter(|path| path.starts_with(&self.prefix))
            .collect())
    }

    fn open(&self, path: &str) -> RemoteResult<Box<dyn RemoteTransport>> {
        Ok(Box::new(self.server.open(path)))
    }

    fn release_connections(&self) {
        self.server.inner.releases.fetch_add(1, Ordering::SeqCst);
        debug!(prefix = %self.prefix, "released remote connections");
    }
}
