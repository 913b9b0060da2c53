//! The hiding wrapper around a plain remote collection.
//!
//! Every component written through [`HidingCollection`] is serialized,
//! encrypted and framed, then embedded in a neutral shell: the UID, the
//! placeholder fields of its kind and one [`HIDDEN_FIELD`] carrying the frame.
//! Attachments travel as a separate hidden attachment. Collection names,
//! colors and the managed marker are hidden the same way in properties, while
//! the server-visible display name stays a placeholder.
//!
//! Reading accepts records without the marker (written by a plain client) as
//! the real payload.

use crate::collection::{HiddenBatch, RemoteCollection};
use crate::error::{RemoteError, RemoteResult};
use crate::transport::{CollectionProperties, RemoteTransport, CTAG_PROPERTY, DISPLAY_NAME_PROPERTY};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use veildav_core::{
    decode_component, encode_component, Attachment, CTag, Component, ComponentETagPair, ETag,
    ExposedAttachment, ExposedComponent,
};
use veildav_crypto::{CipherService, CryptoError};

/// Field carrying the hidden payload.
pub const HIDDEN_FIELD: &str = "X-VEIL-HIDDEN";

/// Property carrying the hidden display name.
pub const HIDDEN_DISPLAY_NAME_PROPERTY: &str = "x-veil-hidden-displayname";

/// Property carrying the hidden color.
pub const HIDDEN_COLOR_PROPERTY: &str = "x-veil-hidden-color";

/// Property carrying the hidden managed marker.
pub const MANAGED_PROPERTY: &str = "x-veil-managed";

/// Display name the server sees for every hidden collection.
pub const PLACEHOLDER_DISPLAY_NAME: &str = "Hidden Collection";

/// MIME type the server sees for every hidden attachment.
pub const HIDDEN_ATTACHMENT_MIME: &str = "application/octet-stream";

const MANAGED_VALUE: &str = "true";

/// A [`RemoteCollection`] over a plain [`RemoteTransport`] that keeps content
/// away from the server.
pub struct HidingCollection<C, T = Box<dyn RemoteTransport>> {
    transport: T,
    cipher: Arc<dyn CipherService>,
    properties: Option<CollectionProperties>,
    _component: PhantomData<fn() -> C>,
}

impl<C: Component, T: RemoteTransport> HidingCollection<C, T> {
    /// Wraps a transport.
    pub fn new(transport: T, cipher: Arc<dyn CipherService>) -> Self {
        Self {
            transport,
            cipher,
            properties: None,
            _component: PhantomData,
        }
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the exposed form of a component.
    pub fn expose(&self, component: &C) -> RemoteResult<ExposedComponent> {
        let uid = component
            .uid()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| RemoteError::invalid_component("", "component has no uid", false))?;

        let mut payload = component.clone();
        let attachment = payload.attachment().cloned();
        payload.set_attachment(None);
        let plain = encode_component(&payload)
            .map_err(|e| RemoteError::invalid_component(uid, e, false))?;

        let mut exposed = ExposedComponent::new(uid);
        for (name, value) in C::shell_fields() {
            exposed.fields.insert((*name).to_string(), (*value).to_string());
        }
        exposed
            .fields
            .insert(HIDDEN_FIELD.to_string(), self.hide(uid, &plain)?);

        if let Some(attachment) = attachment {
            let mut bytes = Vec::new();
            ciborium::into_writer(&attachment, &mut bytes)
                .map_err(|e| RemoteError::invalid_component(uid, e, false))?;
            exposed.attachment = Some(ExposedAttachment {
                mime_type: HIDDEN_ATTACHMENT_MIME.to_string(),
                hidden: true,
                data: self.hide(uid, &bytes)?.into_bytes(),
            });
        }
        Ok(exposed)
    }

    /// Recovers the real component from its exposed form.
    pub fn reveal(&self, exposed: &ExposedComponent) -> RemoteResult<C> {
        let uid = exposed.uid.as_str();
        let Some(opaque) = exposed.field(HIDDEN_FIELD) else {
            debug!(uid, "reading plain component");
            return C::from_plain(exposed)
                .map_err(|e| RemoteError::invalid_component(uid, e, false));
        };

        let plain = self.unhide(uid, opaque)?;
        let mut component: C =
            decode_component(&plain).map_err(|e| RemoteError::invalid_component(uid, e, false))?;
        let inner_uid = component.uid().map(str::to_string);
        match inner_uid.as_deref() {
            None => component.set_uid(Some(uid.to_string())),
            Some(inner) if inner != uid => {
                return Err(RemoteError::invalid_component(
                    uid,
                    format!("hidden uid {inner} does not match"),
                    true,
                ));
            }
            Some(_) => {}
        }

        if let Some(attachment) = &exposed.attachment {
            component.set_attachment(Some(self.reveal_attachment(uid, attachment)?));
        }
        Ok(component)
    }

    fn reveal_attachment(&self, uid: &str, exposed: &ExposedAttachment) -> RemoteResult<Attachment> {
        if !exposed.hidden {
            return Ok(Attachment::new(exposed.mime_type.clone(), exposed.data.clone()));
        }
        let opaque = std::str::from_utf8(&exposed.data)
            .map_err(|e| RemoteError::invalid_component(uid, e, true))?;
        let plain = self.unhide(uid, opaque)?;
        ciborium::from_reader(plain.as_slice())
            .map_err(|e| RemoteError::invalid_component(uid, e, false))
    }

    fn hide(&self, uid: &str, plain: &[u8]) -> RemoteResult<String> {
        self.cipher
            .frame_and_encrypt(plain)
            .map_err(|e| RemoteError::invalid_component(uid, e, false))
    }

    fn unhide(&self, uid: &str, opaque: &str) -> RemoteResult<Vec<u8>> {
        self.cipher.decode_and_decrypt(opaque).map_err(|e| match e {
            CryptoError::InvalidMac => RemoteError::InvalidMac {
                uid: uid.to_string(),
            },
            other => RemoteError::invalid_component(uid, other, true),
        })
    }

    fn properties(&mut self) -> RemoteResult<&CollectionProperties> {
        if self.properties.is_none() {
            let fetched = self.transport.fetch_properties()?;
            self.properties = Some(fetched);
        }
        Ok(self.properties.get_or_insert_with(CollectionProperties::new))
    }

    fn hidden_property(&mut self, name: &str) -> RemoteResult<Option<String>> {
        let Some(opaque) = self.properties()?.get(name).cloned() else {
            return Ok(None);
        };
        let plain = self.unhide(name, &opaque)?;
        String::from_utf8(plain)
            .map(Some)
            .map_err(|e| RemoteError::invalid_component(name, e, false))
    }

    fn set_hidden_property(&mut self, name: &str, value: &str) -> RemoteResult<()> {
        let opaque = self.hide(name, value.as_bytes())?;
        self.properties = None;
        self.transport.set_property(name, Some(&opaque))
    }

    fn reveal_batch(&self, fetched: Vec<(ExposedComponent, ETag)>) -> HiddenBatch<C> {
        let mut batch = HiddenBatch::default();
        for (exposed, etag) in fetched {
            match self.reveal(&exposed) {
                Ok(component) => batch
                    .components
                    .push(ComponentETagPair::new(component, Some(etag))),
                Err(err) => {
                    warn!(uid = %exposed.uid, error = %err, "unreadable remote component");
                    batch.failures.push(err);
                }
            }
        }
        batch
    }
}

impl<C: Component, T: RemoteTransport> RemoteCollection<C> for HidingCollection<C, T> {
    fn path(&self) -> &str {
        self.transport.path()
    }

    fn ensure_collection(&mut self, display_name: &str) -> RemoteResult<()> {
        if !self.transport.exists()? {
            self.transport.create_collection()?;
            self.properties = None;
            info!(path = %self.transport.path(), "created remote collection");
        }
        if self.is_managed()? {
            return Ok(());
        }
        self.transport
            .set_property(DISPLAY_NAME_PROPERTY, Some(PLACEHOLDER_DISPLAY_NAME))?;
        if self.hidden_display_name()?.is_none() {
            self.set_hidden_display_name(display_name)?;
        }
        self.mark_managed()
    }

    fn refresh_properties(&mut self) -> RemoteResult<()> {
        self.properties = None;
        self.properties().map(|_| ())
    }

    fn ctag(&mut self) -> RemoteResult<Option<CTag>> {
        Ok(self.properties()?.get(CTAG_PROPERTY).map(CTag::new))
    }

    fn hidden_display_name(&mut self) -> RemoteResult<Option<String>> {
        self.hidden_property(HIDDEN_DISPLAY_NAME_PROPERTY)
    }

    fn set_hidden_display_name(&mut self, name: &str) -> RemoteResult<()> {
        self.set_hidden_property(HIDDEN_DISPLAY_NAME_PROPERTY, name)
    }

    fn hidden_color(&mut self) -> RemoteResult<Option<String>> {
        self.hidden_property(HIDDEN_COLOR_PROPERTY)
    }

    fn set_hidden_color(&mut self, color: &str) -> RemoteResult<()> {
        self.set_hidden_property(HIDDEN_COLOR_PROPERTY, color)
    }

    fn is_managed(&mut self) -> RemoteResult<bool> {
        Ok(self.hidden_property(MANAGED_PROPERTY)?.as_deref() == Some(MANAGED_VALUE))
    }

    fn mark_managed(&mut self) -> RemoteResult<()> {
        self.set_hidden_property(MANAGED_PROPERTY, MANAGED_VALUE)
    }

    fn list_etags(&self) -> RemoteResult<HashMap<String, ETag>> {
        let mut etags = HashMap::new();
        for (uid, etag) in self.transport.list_etags()? {
            if etags.contains_key(&uid) {
                return Err(RemoteError::DuplicateUid { uid });
            }
            etags.insert(uid, etag);
        }
        Ok(etags)
    }

    fn get_hidden_component(&self, uid: &str) -> RemoteResult<ComponentETagPair<C>> {
        let (exposed, etag) = self.transport.get_component(uid)?;
        Ok(ComponentETagPair::new(self.reveal(&exposed)?, Some(etag)))
    }

    fn get_hidden_components(&self, uids: &[String]) -> RemoteResult<HiddenBatch<C>> {
        if uids.is_empty() {
            return Ok(HiddenBatch::default());
        }
        let fetched = self.transport.get_components(uids)?;
        Ok(self.reveal_batch(fetched))
    }

    fn get_all_hidden_components(&self) -> RemoteResult<HiddenBatch<C>> {
        let uids: Vec<String> = self.list_etags()?.into_keys().collect();
        self.get_hidden_components(&uids)
    }

    fn add_hidden_component(&self, component: &C) -> RemoteResult<Option<ETag>> {
        let exposed = self.expose(component)?;
        self.transport.put_component(&exposed, None)
    }

    fn update_hidden_component(&self, component: &C, etag: &ETag) -> RemoteResult<Option<ETag>> {
        let exposed = self.expose(component)?;
        self.transport.put_component(&exposed, Some(etag))
    }

    fn remove_component(&self, uid: &str, etag: Option<&ETag>) -> RemoteResult<()> {
        self.transport.delete_component(uid, etag)
    }

    fn close(&mut self) -> RemoteResult<()> {
        self.transport.close()
    }
}
