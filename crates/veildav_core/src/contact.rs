//! Address book records.

use crate::component::{Component, ComponentKind};
use crate::error::{CoreError, CoreResult};
use crate::types::{Attachment, ExposedComponent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding the formatted name in plain records.
const FIELD_FORMATTED_NAME: &str = "FN";

/// An address book entry.
///
/// `fields` is produced by the field-mapping layer (EMAIL, TEL, ORG, ...) and
/// is carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact UID.
    pub uid: Option<String>,
    /// Display name of the contact.
    pub formatted_name: String,
    /// Remaining mapped fields.
    pub fields: BTreeMap<String, String>,
    /// Contact photo.
    pub photo: Option<Attachment>,
}

impl Contact {
    /// Creates a contact with a name and nothing else.
    pub fn new(formatted_name: impl Into<String>) -> Self {
        Self {
            uid: None,
            formatted_name: formatted_name.into(),
            fields: BTreeMap::new(),
            photo: None,
        }
    }

    /// Adds a mapped field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl Component for Contact {
    const KIND: ComponentKind = ComponentKind::Contact;

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn set_uid(&mut self, uid: Option<String>) {
        self.uid = uid;
    }

    fn attachment(&self) -> Option<&Attachment> {
        self.photo.as_ref()
    }

    fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.photo = attachment;
    }

    fn validate(&self) -> CoreResult<()> {
        if self.formatted_name.trim().is_empty() {
            return Err(CoreError::invalid_component("contact without a name"));
        }
        if self.uid.as_deref() == Some("") {
            return Err(CoreError::invalid_component("contact with an empty uid"));
        }
        Ok(())
    }

    fn from_plain(exposed: &ExposedComponent) -> CoreResult<Self> {
        let mut fields = exposed.fields.clone();
        let formatted_name = fields
            .remove(FIELD_FORMATTED_NAME)
            .ok_or_else(|| CoreError::invalid_component("plain contact without FN"))?;

        let contact = Self {
            uid: Some(exposed.uid.clone()),
            formatted_name,
            fields,
            photo: exposed
                .attachment
                .as_ref()
                .map(|a| Attachment::new(a.mime_type.clone(), a.data.clone())),
        };
        contact.validate()?;
        Ok(contact)
    }

    fn shell_fields() -> &'static [(&'static str, &'static str)] {
        &[(FIELD_FORMATTED_NAME, "Hidden Contact")]
    }
}
