//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;
use veildav_core::{Attachment, Contact, Event};

/// Strategy for display names and other short human text.
pub fn display_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ,.'-]{0,39}").expect("Invalid regex")
}

/// Strategy for mapped fields of a record.
pub fn fields_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(
        prop::sample::select(vec!["EMAIL", "TEL", "ORG", "NOTE", "URL", "ADR"])
            .prop_map(str::to_string),
        ".{0,64}",
        0..5,
    )
}

/// Strategy for attachments.
pub fn attachment_strategy() -> impl Strategy<Value = Attachment> {
    (
        prop::sample::select(vec!["image/jpeg", "image/png", "text/plain"]),
        prop::collection::vec(any::<u8>(), 0..512),
    )
        .prop_map(|(mime, data)| Attachment::new(mime, data))
}

/// Strategy for new local contacts (no UID).
pub fn new_contact_strategy() -> impl Strategy<Value = Contact> {
    (
        display_name_strategy(),
        fields_strategy(),
        prop::option::of(attachment_strategy()),
    )
        .prop_map(|(name, fields, photo)| {
            let mut contact = Contact::new(name);
            contact.fields = fields;
            contact.photo = photo;
            contact
        })
}

/// Strategy for a contact with the given UID.
pub fn contact_strategy(uid: String) -> impl Strategy<Value = Contact> {
    new_contact_strategy().prop_map(move |mut contact| {
        contact.uid = Some(uid.clone());
        contact
    })
}

/// Strategy for `len` contacts with distinct UIDs `c0..`.
pub fn contacts_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Contact>> {
    prop::collection::vec(new_contact_strategy(), len).prop_map(|contacts| {
        contacts
            .into_iter()
            .enumerate()
            .map(|(i, mut contact)| {
                contact.uid = Some(format!("c{i}"));
                contact
            })
            .collect()
    })
}

/// Strategy for valid single events with a UID.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        "[a-z0-9]{8}",
        display_name_strategy(),
        0i64..2_000_000_000,
        0i64..86_400,
        prop::option::of(Just("FREQ=WEEKLY".to_string())),
        fields_strategy(),
    )
        .prop_map(|(uid, summary, start, length, rule, fields)| {
            let mut event = Event::new(summary, start, start + length);
            event.uid = Some(uid);
            event.recurrence_rule = rule;
            event.fields = fields;
            event
        })
}
