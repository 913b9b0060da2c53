//! Calendar records.

use crate::component::{Component, ComponentKind};
use crate::error::{CoreError, CoreResult};
use crate::types::{Attachment, ExposedComponent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const FIELD_SUMMARY: &str = "SUMMARY";
const FIELD_START: &str = "DTSTART";
const FIELD_END: &str = "DTEND";
const FIELD_RRULE: &str = "RRULE";
const FIELD_PARENT: &str = "RELATED-TO";
const FIELD_RECURRENCE_ID: &str = "RECURRENCE-ID";

/// Links a recurrence exception to the recurring event it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceLink {
    /// UID of the recurring parent.
    pub parent_uid: String,
    /// Start of the overridden instance, in seconds since the epoch.
    pub instance_start: i64,
}

/// A calendar entry.
///
/// Times are seconds since the Unix epoch; time zone handling belongs to the
/// field-mapping layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event UID.
    pub uid: Option<String>,
    /// Title.
    pub summary: String,
    /// Start time.
    pub starts_at: i64,
    /// End time.
    pub ends_at: i64,
    /// Recurrence rule text, verbatim.
    pub recurrence_rule: Option<String>,
    /// Present when this event overrides one instance of a recurring event.
    pub recurrence_of: Option<RecurrenceLink>,
    /// Remaining mapped fields.
    pub fields: BTreeMap<String, String>,
    /// Optional attachment.
    pub attachment: Option<Attachment>,
}

impl Event {
    /// Creates a single, non-recurring event.
    pub fn new(summary: impl Into<String>, starts_at: i64, ends_at: i64) -> Self {
        Self {
            uid: None,
            summary: summary.into(),
            starts_at,
            ends_at,
            recurrence_rule: None,
            recurrence_of: None,
            fields: BTreeMap::new(),
            attachment: None,
        }
    }

    /// Makes this event an exception of `parent_uid` for the instance starting
    /// at `instance_start`, builder style.
    #[must_use]
    pub fn exception_of(mut self, parent_uid: impl Into<String>, instance_start: i64) -> Self {
        self.recurrence_of = Some(RecurrenceLink {
            parent_uid: parent_uid.into(),
            instance_start,
        });
        self
    }

    /// Returns true for recurrence exceptions.
    pub fn is_exception(&self) -> bool {
        self.recurrence_of.is_some()
    }
}

fn parse_time(exposed: &ExposedComponent, field: &str) -> CoreResult<i64> {
    let raw = exposed
        .field(field)
        .ok_or_else(|| CoreError::invalid_component(format!("plain event without {field}")))?;
    raw.trim()
        .parse()
        .map_err(|_| CoreError::invalid_component(format!("{field} is not a timestamp: {raw}")))
}

impl Component for Event {
    const KIND: ComponentKind = ComponentKind::Event;

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn set_uid(&mut self, uid: Option<String>) {
        self.uid = uid;
    }

    fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.attachment = attachment;
    }

    fn depends_on(&self) -> Option<&str> {
        self.recurrence_of.as_ref().map(|link| link.parent_uid.as_str())
    }

    fn validate(&self) -> CoreResult<()> {
        if self.ends_at < self.starts_at {
            return Err(CoreError::invalid_component(format!(
                "event ends ({}) before it starts ({})",
                self.ends_at, self.starts_at
            )));
        }
        if let Some(link) = &self.recurrence_of {
            if link.parent_uid.is_empty() {
                return Err(CoreError::invalid_component("exception without parent uid"));
            }
            if self.uid.as_deref() == Some(link.parent_uid.as_str()) {
                return Err(CoreError::invalid_component("event is its own parent"));
            }
            if self.recurrence_rule.is_some() {
                return Err(CoreError::invalid_component("exception carries a recurrence rule"));
            }
        }
        Ok(())
    }

    fn from_plain(exposed: &ExposedComponent) -> CoreResult<Self> {
        let mut fields = exposed.fields.clone();
        let summary = fields.remove(FIELD_SUMMARY).unwrap_or_default();
        let starts_at = parse_time(exposed, FIELD_START)?;
        let ends_at = parse_time(exposed, FIELD_END)?;
        fields.remove(FIELD_START);
        fields.remove(FIELD_END);
        let recurrence_rule = fields.remove(FIELD_RRULE);

        let recurrence_of = match fields.remove(FIELD_PARENT) {
            Some(parent_uid) => Some(RecurrenceLink {
                parent_uid,
                instance_start: parse_time(exposed, FIELD_RECURRENCE_ID)?,
            }),
            None => None,
        };
        fields.remove(FIELD_RECURRENCE_ID);

        let event = Self {
            uid: Some(exposed.uid.clone()),
            summary,
            starts_at,
            ends_at,
            recurrence_rule,
            recurrence_of,
            fields,
            attachment: exposed
                .attachment
                .as_ref()
                .map(|a| Attachment::new(a.mime_type.clone(), a.data.clone())),
        };
        event.validate()?;
        Ok(event)
    }

    fn shell_fields() -> &'static [(&'static str, &'static str)] {
        &[
            (FIELD_SUMMARY, "Hidden Event"),
            (FIELD_START, "0"),
            (FIELD_END, "0"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_depends_on_parent() {
        let single = Event::new("Lunch", 0, 3600);
        assert_eq!(single.depends_on(), None);

        let exception = Event::new("Lunch (moved)", 7200, 10800).exception_of("series-1", 0);
        assert!(exception.is_exception());
        assert_eq!(exception.depends_on(), Some("series-1"));
    }

    #[test]
    fn validation_rules() {
        assert!(Event::new("ok", 0, 0).validate().is_ok());
        assert!(Event::new("backwards", 10, 5).validate().is_err());

        let mut own_parent = Event::new("loop", 0, 1).exception_of("x", 0);
        own_parent.uid = Some("x".into());
        assert!(own_parent.validate().is_err());

        let mut recurring_exception = Event::new("odd", 0, 1).exception_of("p", 0);
        recurring_exception.recurrence_rule = Some("FREQ=DAILY".into());
        assert!(recurring_exception.validate().is_err());
    }

    #[test]
    fn from_plain_reads_timestamps_and_links() {
        let exposed = ExposedComponent::new("ex-1")
            .with_field("SUMMARY", "Retro")
            .with_field("DTSTART", "1000")
            .with_field("DTEND", "2000")
            .with_field("RELATED-TO", "series-9")
            .with_field("RECURRENCE-ID", "500")
            .with_field("LOCATION", "Room 4");

        let event = Event::from_plain(&exposed).unwrap();
        assert_eq!(event.uid(), Some("ex-1"));
        assert_eq!((event.starts_at, event.ends_at), (1000, 2000));
        assert_eq!(
            event.recurrence_of,
            Some(RecurrenceLink {
                parent_uid: "series-9".into(),
                instance_start: 500
            })
        );
        assert_eq!(event.fields.len(), 1);
        assert_eq!(event.fields.get("LOCATION").map(String::as_str), Some("Room 4"));
    }

    #[test]
    fn from_plain_rejects_bad_timestamp() {
        let exposed = ExposedComponent::new("bad")
            .with_field("DTSTART", "tomorrow")
            .with_field("DTEND", "2000");
        assert!(matches!(
            Event::from_plain(&exposed),
            Err(CoreError::InvalidComponent { .. })
        ));
    }
}
