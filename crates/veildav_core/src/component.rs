//! The component abstraction shared by contacts and events.

use crate::error::{CoreError, CoreResult};
use crate::types::{Attachment, ETag, ExposedComponent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Kind of record a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Address book entries.
    Contact,
    /// Calendar entries.
    Event,
}

impl ComponentKind {
    /// Short lowercase name, used in logs and thread names.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Contact => "contact",
            ComponentKind::Event => "event",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One synchronizable record.
///
/// Collections, queues and the sync worker are generic over this trait; the
/// implementing type is the per-kind strategy. It tells the generic code
/// where the UID and attachment live, which other component it depends on,
/// how to validate itself, and what the neutral placeholder shown to the
/// server looks like.
pub trait Component:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind of record.
    const KIND: ComponentKind;

    /// Returns the UID, if one has been assigned.
    fn uid(&self) -> Option<&str>;

    /// Sets or clears the UID.
    fn set_uid(&mut self, uid: Option<String>);

    /// Returns the attachment, if any.
    fn attachment(&self) -> Option<&Attachment>;

    /// Replaces the attachment.
    fn set_attachment(&mut self, attachment: Option<Attachment>);

    /// UID of a component that must exist locally before this one can be
    /// stored, such as the parent of a recurrence exception.
    fn depends_on(&self) -> Option<&str> {
        None
    }

    /// Checks the structural rules of the record.
    fn validate(&self) -> CoreResult<()>;

    /// Builds a component from an exposed record that carries no hidden
    /// payload, i.e. a record written by a client that does not hide.
    fn from_plain(exposed: &ExposedComponent) -> CoreResult<Self>;

    /// Placeholder identity fields written in place of the real content.
    fn shell_fields() -> &'static [(&'static str, &'static str)];
}

/// Serializes a component to CBOR.
pub fn encode_component<C: Component>(component: &C) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(component, &mut bytes).map_err(CoreError::serialization)?;
    Ok(bytes)
}

/// Deserializes and validates a component from CBOR.
pub fn decode_component<C: Component>(bytes: &[u8]) -> CoreResult<C> {
    let component: C = ciborium::de::from_reader(bytes)
        .map_err(|e| CoreError::invalid_component(format!("undecodable {}: {e}", C::KIND)))?;
    component.validate()?;
    Ok(component)
}

/// An immutable component paired with the ETag it was read or written with.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentETagPair<C> {
    component: C,
    etag: Option<ETag>,
}

impl<C: Component> ComponentETagPair<C> {
    /// Creates a pair.
    pub fn new(component: C, etag: Option<ETag>) -> Self {
        Self { component, etag }
    }

    /// The component.
    pub fn component(&self) -> &C {
        &self.component
    }

    /// The ETag, absent when the server did not confirm one.
    pub fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    /// Splits the pair.
    pub fn into_parts(self) -> (C, Option<ETag>) {
        (self.component, self.etag)
    }
}
