//! # veildav remote
//!
//! Remote side of veildav.
//!
//! - [`RemoteTransport`] and [`RemoteAccount`]: the plain wire contract, one
//!   collection at a time, plus discovery
//! - [`MemoryServer`]: an in-memory (optionally file-backed) server with
//!   fault injection
//! - [`RemoteCollection`] and [`HidingCollection`]: what the sync worker
//!   drives; records and collection metadata are encrypted on the way out and
//!   decrypted on the way in
//!
//! ```
//! use std::sync::Arc;
//! use veildav_core::Contact;
//! use veildav_crypto::{AesGcmCipher, MasterKey};
//! use veildav_remote::{HidingCollection, MemoryServer, RemoteCollection};
//!
//! let server = MemoryServer::new();
//! let cipher = Arc::new(AesGcmCipher::new(&MasterKey::generate()));
//! let mut remote: HidingCollection<Contact, _> =
//!     HidingCollection::new(server.open("contacts/default"), cipher);
//! remote.ensure_collection("Friends").unwrap();
//!
//! let mut contact = Contact::new("Ada Lovelace");
//! contact.uid = Some("ada".into());
//! remote.add_hidden_component(&contact).unwrap();
//!
//! let (stored, _) = server.stored("contacts/default", "ada").unwrap();
//! assert_eq!(stored.field("FN"), Some("Hidden Contact"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod hiding;
mod server;
mod transport;

pub use collection::{HiddenBatch, RemoteCollection};
pub use error::{RemoteError, RemoteResult};
pub use hiding::{
    HidingCollection, HIDDEN_ATTACHMENT_MIME, HIDDEN_COLOR_PROPERTY, HIDDEN_DISPLAY_NAME_PROPERTY,
    HIDDEN_FIELD, MANAGED_PROPERTY, PLACEHOLDER_DISPLAY_NAME,
};
pub use server::{etag_of, MemoryServer, ServerAccount, ServerCollection};
pub use transport::{
    CollectionProperties, RemoteAccount, RemoteTransport, CTAG_PROPERTY, DISPLAY_NAME_PROPERTY,
};
