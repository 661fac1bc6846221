// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Normalized events and the annotation stages applied to them.
//!
//! An [`Event`] is a flat map of fields plus a message. It is built from an envelope by
//! [`Event::from_envelope`] and then enriched in place, always in this order:
//!
//! ```text
//!   Envelope
//!      │  from_envelope            (type-specific payload fields)
//!      v
//!   Event
//!      │  annotate_with_envelope_data   (deployment, job, ip...)
//!      │  annotate_with_metadata        (operator extra fields, these win on collision)
//!      │  annotate_with_app_data        (only with a cf_app_id: app/space/org names)
//!      v
//!   filters / forwarder
//! ```
//!
//! Annotation only ever adds or overwrites keys; no stage removes one.

use crate::caching::{AppCache, CacheError};
use crate::envelope::{Envelope, EnvelopeEvent, EventKind};
use crate::extra_fields::ExtraFields;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

/// Presence of this field marks an event as belonging to an application.
pub const APP_ID_FIELD: &str = "cf_app_id";
pub const APP_NAME_FIELD: &str = "cf_app_name";
pub const SPACE_ID_FIELD: &str = "cf_space_id";
pub const SPACE_NAME_FIELD: &str = "cf_space_name";
pub const ORG_ID_FIELD: &str = "cf_org_id";
pub const ORG_NAME_FIELD: &str = "cf_org_name";
pub const IGNORED_APP_FIELD: &str = "cf_ignored_app";

const ORIGIN_FIELD: &str = "origin";
const CF_ORIGIN_FIELD: &str = "cf_origin";
const CF_ORIGIN_VALUE: &str = "firehose";
const EVENT_TYPE_FIELD: &str = "event_type";
const ENVELOPE_TIMESTAMP_FIELD: &str = "envelope_timestamp";
const TAG_FIELD_PREFIX: &str = "tag_";

/// A scalar field value. Rendered to a string only when the event is forwarded.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::UInt(u) => write!(f, "{u}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInt(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub fields: HashMap<String, FieldValue>,
    pub message: String,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Event {
            kind,
            fields: HashMap::new(),
            message: String::new(),
        }
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Whether the event carries an application id field, empty or not.
    #[must_use]
    pub fn has_app_id(&self) -> bool {
        self.fields.contains_key(APP_ID_FIELD)
    }

    /// The application id, if present and non-empty.
    #[must_use]
    pub fn app_id(&self) -> Option<String> {
        self.fields
            .get(APP_ID_FIELD)
            .map(ToString::to_string)
            .filter(|id| !id.is_empty())
    }

    /// Normalizes an envelope's payload into an event.
    ///
    /// Returns `None` for [`EnvelopeEvent::Unknown`]; the caller decides what to do with payloads
    /// it cannot interpret.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let event = match &envelope.event {
            EnvelopeEvent::HttpStartStop(http) => {
                let mut event = Event::new(EventKind::HttpStartStop);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set("start_timestamp", http.start_timestamp);
                event.set("stop_timestamp", http.stop_timestamp);
                event.set(
                    "duration_ms",
                    (http.stop_timestamp.saturating_sub(http.start_timestamp) / 1_000_000).max(0),
                );
                event.set("request_id", http.request_id.as_str());
                event.set("peer_type", http.peer_type.as_str());
                event.set("method", http.method.as_str());
                event.set("uri", http.uri.as_str());
                event.set("remote_addr", http.remote_address.as_str());
                event.set("user_agent", http.user_agent.as_str());
                event.set("status_code", http.status_code);
                event.set("content_length", http.content_length);
                event.set("instance_index", http.instance_index);
                event.set("instance_id", http.instance_id.as_str());
                event.set("forwarded", http.forwarded.clone());
                if let Some(app_id) = &http.application_id {
                    event.set(APP_ID_FIELD, app_id.as_str());
                }
                event
            }
            EnvelopeEvent::LogMessage(log) => {
                let mut event = Event::new(EventKind::LogMessage);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set(APP_ID_FIELD, log.app_id.as_str());
                event.set("timestamp", log.timestamp);
                event.set("source_type", log.source_type.as_str());
                event.set("message_type", log.message_type.as_str());
                event.set("source_instance", log.source_instance.as_str());
                event.message.clone_from(&log.message);
                event
            }
            EnvelopeEvent::ValueMetric(metric) => {
                let mut event = Event::new(EventKind::ValueMetric);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set("name", metric.name.as_str());
                event.set("value", metric.value);
                event.set("unit", metric.unit.as_str());
                event
            }
            EnvelopeEvent::CounterEvent(counter) => {
                let mut event = Event::new(EventKind::CounterEvent);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set("name", counter.name.as_str());
                event.set("delta", counter.delta);
                event.set("total", counter.total);
                event
            }
            EnvelopeEvent::Error(err) => {
                let mut event = Event::new(EventKind::Error);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set("source", err.source.as_str());
                event.set("code", err.code);
                event.message.clone_from(&err.message);
                event
            }
            EnvelopeEvent::ContainerMetric(metric) => {
                let mut event = Event::new(EventKind::ContainerMetric);
                event.set(ORIGIN_FIELD, envelope.origin.as_str());
                event.set(APP_ID_FIELD, metric.application_id.as_str());
                event.set("instance_index", metric.instance_index);
                event.set("cpu_percentage", metric.cpu_percentage);
                event.set("memory_bytes", metric.memory_bytes);
                event.set("disk_bytes", metric.disk_bytes);
                event.set("memory_bytes_quota", metric.memory_bytes_quota);
                event.set("disk_bytes_quota", metric.disk_bytes_quota);
                event
            }
            EnvelopeEvent::Unknown => return None,
        };
        Some(event)
    }

    /// Copies envelope-level metadata into the fields.
    ///
    /// The envelope time goes under `envelope_timestamp` so it never shadows a payload
    /// `timestamp`. Each envelope tag becomes a `tag_<name>` field.
    pub fn annotate_with_envelope_data(&mut self, envelope: &Envelope) {
        let kind = self.kind;
        self.set(CF_ORIGIN_FIELD, CF_ORIGIN_VALUE);
        self.set(EVENT_TYPE_FIELD, kind.as_str());
        self.set(ENVELOPE_TIMESTAMP_FIELD, envelope.timestamp);
        self.set("deployment", envelope.deployment.as_str());
        self.set("job", envelope.job.as_str());
        self.set("job_index", envelope.index.as_str());
        self.set("ip", envelope.ip.as_str());
        for (name, value) in &envelope.tags {
            self.set(format!("{TAG_FIELD_PREFIX}{name}"), value.as_str());
        }
    }

    /// Merges the operator's static fields. They overwrite any key already set.
    pub fn annotate_with_metadata(&mut self, extra_fields: &ExtraFields) {
        for (key, value) in extra_fields {
            self.set(key.as_str(), value.as_str());
        }
    }

    /// Looks up the event's application and adds its name, space and org.
    ///
    /// Returns `true` when the cache knew the application. A missing or empty app id, an unknown
    /// app or a failing cache leave the event untouched.
    pub fn annotate_with_app_data(&mut self, cache: &dyn AppCache) -> bool {
        let Some(app_id) = self.app_id() else {
            return false;
        };

        let app = match cache.get_app(&app_id) {
            Ok(app) => app,
            Err(CacheError::NotFound(_)) => {
                debug!("No metadata for application {}, forwarding without it", app_id);
                return false;
            }
            Err(e) => {
                error!("Failed to fetch metadata for application {}: {}", app_id, e);
                return false;
            }
        };

        for (key, value) in [
            (APP_NAME_FIELD, app.name),
            (SPACE_ID_FIELD, app.space_guid),
            (SPACE_NAME_FIELD, app.space_name),
            (ORG_ID_FIELD, app.org_guid),
            (ORG_NAME_FIELD, app.org_name),
        ] {
            if !value.is_empty() {
                self.set(key, value);
            }
        }
        self.set(IGNORED_APP_FIELD, app.ignored);
        true
    }
}
