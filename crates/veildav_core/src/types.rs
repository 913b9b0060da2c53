//! Identifiers, version tokens and the exposed record shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque per-component version token assigned by the server.
///
/// An ETag changes iff the server-side representation of the component
/// changed. A local component without an ETag has not been confirmed by the
/// server yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    /// Wraps a server-provided token.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-collection version token.
///
/// Changes whenever any member or direct property of the collection changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CTag(String);

impl CTag {
    /// Wraps a server-provided token.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a component inside the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(u64);

impl LocalId {
    /// Creates a local id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A binary attachment (contact photo, event attachment).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// An attachment as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedAttachment {
    /// MIME type as seen by the server.
    pub mime_type: String,
    /// Whether `data` is a hidden (framed ciphertext) attachment.
    pub hidden: bool,
    /// Stored bytes.
    pub data: Vec<u8>,
}

/// A component as the server stores and returns it.
///
/// For hidden components the fields hold a neutral placeholder identity and
/// the ciphertext marker; for plain components they are the real payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedComponent {
    /// The component UID, used by the server for addressing.
    pub uid: String,
    /// Named text fields.
    pub fields: BTreeMap<String, String>,
    /// Optional binary attachment.
    pub attachment: Option<ExposedAttachment>,
}

impl ExposedComponent {
    /// Creates an exposed component with no fields.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            fields: BTreeMap::new(),
            attachment: None,
        }
    }

    /// Sets a field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Approximate stored size, used by the server for accounting.
    pub fn stored_len(&self) -> usize {
        let fields: usize = self.fields.iter().map(|(k, v)| k.len() + v.len()).sum();
        let attachment = self.attachment.as_ref().map_or(0, |a| a.data.len());
        self.uid.len() + fields + attachment
    }
}
