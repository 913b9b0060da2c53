//! Paired local and remote collections for sync tests.

use std::sync::Arc;
use veildav_core::{
    Component, ExposedComponent, LocalAccount, LocalCollection, LocalComponent, LocalId,
    LocalStore, MemoryStateStore, QueueLimits,
};
use veildav_crypto::{AesGcmCipher, CipherService, MasterKey};
use veildav_remote::{
    HidingCollection, MemoryServer, RemoteCollection, RemoteTransport, ServerCollection,
    HIDDEN_FIELD,
};

use crate::fixtures::test_key;

/// One local collection and the server that holds its remote counterpart.
pub struct PairHarness<C: Component> {
    /// Collection path on both sides.
    pub path: String,
    /// The shared server.
    pub server: MemoryServer,
    /// The local store.
    pub store: LocalStore<C>,
    /// Cipher of this client.
    pub cipher: Arc<dyn CipherService>,
}

impl<C: Component> PairHarness<C> {
    /// Creates an empty local collection at `path`; the server is empty.
    pub fn new(path: &str) -> Self {
        Self::with_limits(path, QueueLimits::default())
    }

    /// Like [`new`](Self::new) with custom queue bounds.
    pub fn with_limits(path: &str, limits: QueueLimits) -> Self {
        let store = LocalStore::with_limits(Arc::new(MemoryStateStore::new()), limits);
        store
            .create_collection(path)
            .expect("Failed to create local collection");
        Self {
            path: path.to_string(),
            server: MemoryServer::new(),
            store,
            cipher: Arc::new(AesGcmCipher::new(&test_key())),
        }
    }

    /// A fresh handle on the local collection.
    pub fn local(&self) -> Box<dyn LocalCollection<C>> {
        self.store
            .open(&self.path)
            .expect("Failed to open local collection")
    }

    /// A fresh hidden remote collection over a new connection.
    pub fn remote(&self) -> Box<dyn RemoteCollection<C>> {
        Box::new(HidingCollection::new(
            self.server.open(&self.path),
            Arc::clone(&self.cipher),
        ))
    }

    /// Another client with the same key, for changing the server behind the
    /// back of the local collection. The remote collection is created.
    pub fn peer(&self) -> HidingCollection<C, ServerCollection> {
        self.peer_with_key(&test_key())
    }

    /// Another client using `key`.
    pub fn peer_with_key(&self, key: &MasterKey) -> HidingCollection<C, ServerCollection> {
        let mut peer = HidingCollection::new(
            self.server.open(&self.path),
            Arc::new(AesGcmCipher::new(key)),
        );
        peer.ensure_collection("Peer")
            .expect("Failed to create remote collection");
        peer
    }

    /// Stores `component` on the server as another client would.
    pub fn seed_remote(&self, component: &C) {
        let mut peer = self.peer();
        peer.add_hidden_component(component)
            .expect("Failed to seed remote component");
        peer.close().expect("Failed to close peer");
    }

    /// Creates a new, dirty local component.
    pub fn create_local(&self, component: C) -> LocalId {
        self.store
            .create_component(&self.path, component)
            .expect("Failed to create local component")
    }

    /// Every local component.
    pub fn local_components(&self) -> Vec<LocalComponent<C>> {
        self.store
            .components(&self.path)
            .expect("Failed to read local components")
    }

    /// Finds a local component by UID.
    pub fn local_by_uid(&self, uid: &str) -> Option<LocalComponent<C>> {
        self.store
            .find_by_uid(&self.path, uid)
            .expect("Failed to read local components")
    }

    /// Sorted UIDs stored on the server.
    pub fn remote_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self
            .server
            .members(&self.path)
            .into_iter()
            .map(|(exposed, _)| exposed.uid)
            .collect();
        uids.sort();
        uids
    }

    /// Reads a component from the server through the hiding layer.
    pub fn remote_component(&self, uid: &str) -> Option<C> {
        let transport = self.server.open(&self.path);
        let collection: HidingCollection<C, ServerCollection> =
            HidingCollection::new(transport, Arc::clone(&self.cipher));
        let result = collection.get_hidden_component(uid).ok();
        let _ = collection.transport().close();
        result.map(|pair| pair.into_parts().0)
    }

    /// Flips one character of a stored ciphertext so that it fails
    /// authentication on read.
    pub fn tamper_remote(&self, uid: &str) {
        let (mut exposed, _) = self
            .server
            .stored(&self.path, uid)
            .expect("No such remote component");
        let opaque = exposed
            .fields
            .get_mut(HIDDEN_FIELD)
            .expect("Remote component is not hidden");
        let middle = opaque.len() / 2;
        let flipped = if opaque.as_bytes()[middle] == b'A' { "B" } else { "A" };
        opaque.replace_range(middle..=middle, flipped);
        self.server
            .store_raw(&self.path, exposed)
            .expect("Failed to store tampered component");
    }

    /// Stores a record whose hidden field is not a frame at all.
    pub fn store_garbage(&self, uid: &str) {
        self.server
            .store_raw(
                &self.path,
                ExposedComponent::new(uid).with_field(HIDDEN_FIELD, "not a frame"),
            )
            .expect("Failed to store garbage");
    }

    /// The CTag recorded locally.
    pub fn local_ctag(&self) -> Option<String> {
        self.local()
            .ctag()
            .expect("Failed to read local ctag")
            .map(|ctag| ctag.as_str().to_string())
    }

    /// The CTag the server reports.
    pub fn remote_ctag(&self) -> Option<String> {
        self.server
            .properties(&self.path)
            .and_then(|properties| properties.get(veildav_remote::CTAG_PROPERTY).cloned())
    }
}
