// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoded firehose envelopes.
//!
//! An [`Envelope`] carries transport-level metadata (origin, deployment, job...) and exactly one
//! typed payload. Decoding from the wire is done upstream; this module only describes the shape
//! the router consumes. Envelopes can also be read from JSON, with the payload nested under
//! `event` and `event_type` as its discriminant:
//!
//! ```json
//! {"origin":"rep","deployment":"cf","job":"diego_cell","index":"0","ip":"10.0.0.1",
//!  "event":{"event_type":"LogMessage","message":"hello","message_type":"OUT","timestamp":1,
//!           "app_id":"6d0f8d8a-0c5d-4a5e-9f7b-1f4f9b0b3c11","source_type":"APP/PROC/WEB",
//!           "source_instance":"0"}}
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Closed set of event kinds the firehose can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    HttpStartStop,
    LogMessage,
    ValueMetric,
    CounterEvent,
    Error,
    ContainerMetric,
}

impl EventKind {
    /// Every kind, in alphabetical order.
    pub const ALL: [EventKind; 6] = [
        EventKind::ContainerMetric,
        EventKind::CounterEvent,
        EventKind::Error,
        EventKind::HttpStartStop,
        EventKind::LogMessage,
        EventKind::ValueMetric,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::HttpStartStop => "HttpStartStop",
            EventKind::LogMessage => "LogMessage",
            EventKind::ValueMetric => "ValueMetric",
            EventKind::CounterEvent => "CounterEvent",
            EventKind::Error => "Error",
            EventKind::ContainerMetric => "ContainerMetric",
        }
    }

    /// Looks up a kind by its exact firehose name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded message from the firehose.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Envelope {
    /// Component that emitted the event (e.g. `gorouter`, `rep`).
    pub origin: String,
    /// Emission time in nanoseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub deployment: String,
    #[serde(default)]
    pub job: String,
    /// Index of the job instance. BOSH reports this as a string (often a GUID).
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub event: EnvelopeEvent,
}

/// The typed payload of an envelope.
///
/// `Unknown` stands for any discriminant this router does not understand; it is never
/// normalized into an event.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "event_type")]
pub enum EnvelopeEvent {
    HttpStartStop(HttpStartStop),
    LogMessage(LogMessage),
    ValueMetric(ValueMetric),
    CounterEvent(CounterEvent),
    Error(ErrorEvent),
    ContainerMetric(ContainerMetric),
    #[default]
    #[serde(other)]
    Unknown,
}

impl EnvelopeEvent {
    /// The kind of this payload, or `None` for [`EnvelopeEvent::Unknown`].
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            EnvelopeEvent::HttpStartStop(_) => Some(EventKind::HttpStartStop),
            EnvelopeEvent::LogMessage(_) => Some(EventKind::LogMessage),
            EnvelopeEvent::ValueMetric(_) => Some(EventKind::ValueMetric),
            EnvelopeEvent::CounterEvent(_) => Some(EventKind::CounterEvent),
            EnvelopeEvent::Error(_) => Some(EventKind::Error),
            EnvelopeEvent::ContainerMetric(_) => Some(EventKind::ContainerMetric),
            EnvelopeEvent::Unknown => None,
        }
    }
}

/// Timing of a single HTTP request seen by a router or an app.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpStartStop {
    pub start_timestamp: i64,
    pub stop_timestamp: i64,
    pub request_id: String,
    /// `Client` or `Server`.
    pub peer_type: String,
    pub method: String,
    pub uri: String,
    pub remote_address: String,
    pub user_agent: String,
    pub status_code: i32,
    pub content_length: i64,
    /// Absent for requests that never reached an application (e.g. 404 on an unknown route).
    pub application_id: Option<String>,
    pub instance_index: i32,
    pub instance_id: String,
    pub forwarded: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogMessage {
    pub message: String,
    /// `OUT` or `ERR`.
    pub message_type: String,
    pub timestamp: i64,
    pub app_id: String,
    pub source_type: String,
    pub source_instance: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValueMetric {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CounterEvent {
    pub name: String,
    pub delta: u64,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ErrorEvent {
    pub source: String,
    pub code: i32,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContainerMetric {
    pub application_id: String,
    pub instance_index: i32,
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    pub memory_bytes_quota: u64,
    pub disk_bytes_quota: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("logmessage"), None);
        assert_eq!(EventKind::from_name(""), None);
    }

    #[test]
    fn test_decode_log_message_envelope() {
        let json = r#"{
            "origin": "rep",
            "deployment": "cf",
            "job": "diego_cell",
            "index": "3",
            "ip": "10.0.16.4",
            "timestamp": 41,
            "event": {
                "event_type": "LogMessage",
                "message": "hello",
                "message_type": "OUT",
                "timestamp": 42,
                "app_id": "app-1",
                "source_type": "APP/PROC/WEB",
                "source_instance": "0"
            }
        }"#;

        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.origin, "rep");
        assert_eq!(envelope.index, "3");
        assert_eq!(envelope.timestamp, 41);
        assert_eq!(envelope.event.kind(), Some(EventKind::LogMessage));
        match envelope.event {
            EnvelopeEvent::LogMessage(log) => {
                assert_eq!(log.message, "hello");
                assert_eq!(log.app_id, "app-1");
                assert_eq!(log.timestamp, 42);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_event_type() {
        let json = r#"{"origin": "doppler", "event": {"event_type": "Unsupported", "foo": 1}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event, EnvelopeEvent::Unknown);
        assert_eq!(envelope.event.kind(), None);
    }
}
