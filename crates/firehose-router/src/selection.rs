// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Operator selection of the event types to consume from the firehose.

use crate::envelope::EventKind;
use crate::errors::ConfigError;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// Event type consumed when the operator does not pick any.
pub const DEFAULT_EVENT: EventKind = EventKind::LogMessage;

/// Comma-separated list of the names accepted by [`SelectedEvents::parse`].
#[must_use]
pub fn authorized_event_names() -> String {
    EventKind::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable set of selected event kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedEvents {
    kinds: BTreeSet<EventKind>,
}

impl Default for SelectedEvents {
    fn default() -> Self {
        Self {
            kinds: BTreeSet::from([DEFAULT_EVENT]),
        }
    }
}

impl SelectedEvents {
    /// Parses a comma-separated list of event names.
    ///
    /// A blank string selects [`DEFAULT_EVENT`]. Each entry is trimmed and must be one of
    /// [`authorized_event_names`]; the first entry that is not fails the whole parse.
    ///
    /// ```
    /// use firehose_router::envelope::EventKind;
    /// use firehose_router::selection::SelectedEvents;
    ///
    /// let selected = SelectedEvents::parse("LogMessage, Error").unwrap();
    /// assert!(selected.contains(EventKind::Error));
    /// assert!(SelectedEvents::parse("Bogus").is_err());
    /// ```
    pub fn parse(wanted: &str) -> Result<Self, ConfigError> {
        if wanted.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut kinds = BTreeSet::new();
        for name in wanted.split(',').map(str::trim) {
            match EventKind::from_name(name) {
                Some(kind) => {
                    kinds.insert(kind);
                }
                None => {
                    return Err(ConfigError::RejectedEventName {
                        name: name.to_string(),
                        valid: authorized_event_names(),
                    })
                }
            }
        }
        Ok(Self { kinds })
    }

    #[must_use]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.kinds.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Holder of the current selection.
///
/// Readers get a cheap `Arc` of the current set; [`EventSelector::configure`] replaces it
/// wholesale, so a reader never observes a half-applied selection.
#[derive(Debug, Default)]
pub struct EventSelector {
    current: RwLock<Arc<SelectedEvents>>,
}

impl EventSelector {
    #[must_use]
    pub fn new(selected: SelectedEvents) -> Self {
        Self {
            current: RwLock::new(Arc::new(selected)),
        }
    }

    /// Parses `wanted` and, if valid, makes it the current selection. On error the previous
    /// selection stays in place.
    pub fn configure(&self, wanted: &str) -> Result<Arc<SelectedEvents>, ConfigError> {
        let selected = Arc::new(SelectedEvents::parse(wanted)?);
        for kind in selected.iter() {
            info!("Event Type [{}] is included in the firehose", kind);
        }

        match self.current.write() {
            Ok(mut current) => *current = Arc::clone(&selected),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&selected),
        }
        Ok(selected)
    }

    #[must_use]
    pub fn current(&self) -> Arc<SelectedEvents> {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poisoned) => {
                error!("Event selection lock poisoned, reading last value");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    #[must_use]
    pub fn is_selected(&self, kind: EventKind) -> bool {
        self.current().contains(kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_defaults_to_log_message() {
        for wanted in ["", "   "] {
            let selected = SelectedEvents::parse(wanted).unwrap();
            assert_eq!(selected.len(), 1);
            assert!(selected.contains(EventKind::LogMessage));
        }
    }

    #[test]
    fn test_parse_trims_entries() {
        let selected = SelectedEvents::parse("LogMessage, Error").unwrap();
        assert_eq!(
            selected.iter().collect::<Vec<_>>(),
            vec![EventKind::LogMessage, EventKind::Error]
        );
    }

    #[test]
    fn test_parse_all_kinds() {
        let selected = SelectedEvents::parse(
            "HttpStartStop,LogMessage,ValueMetric,CounterEvent,Error,ContainerMetric",
        )
        .unwrap();
        assert_eq!(selected.len(), 6);
    }

    #[test]
    fn test_parse_rejects_unknown_name() {
        let err = SelectedEvents::parse("LogMessage, Bogus").unwrap_err();
        assert_eq!(
            err,
            ConfigError::RejectedEventName {
                name: "Bogus".to_string(),
                valid: "ContainerMetric, CounterEvent, Error, HttpStartStop, LogMessage, ValueMetric"
                    .to_string(),
            }
        );
        let message = err.to_string();
        assert!(message.contains("Bogus"));
        assert!(message.contains("HttpStartStop"));
    }

    #[test]
    fn test_parse_rejects_empty_entry() {
        assert!(SelectedEvents::parse("LogMessage,,Error").is_err());
    }

    #[test]
    fn test_selector_defaults_to_log_message() {
        let selector = EventSelector::default();
        assert!(selector.is_selected(EventKind::LogMessage));
        assert!(!selector.is_selected(EventKind::Error));
    }

    #[test]
    fn test_configure_replaces_selection() {
        let selector = EventSelector::default();
        selector.configure("Error, ValueMetric").unwrap();

        assert!(!selector.is_selected(EventKind::LogMessage));
        assert!(selector.is_selected(EventKind::Error));
        assert!(selector.is_selected(EventKind::ValueMetric));
    }

    #[test]
    fn test_configure_error_keeps_previous_selection() {
        let selector = EventSelector::default();
        selector.configure("LogMessage, Error").unwrap();
        let before = selector.current();

        assert!(selector.configure("Error, Bogus").is_err());
        assert_eq!(selector.current(), before);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let selector = EventSelector::default();
        let snapshot = selector.current();
        selector.configure("Error").unwrap();

        assert!(snapshot.contains(EventKind::LogMessage));
        assert!(!selector.is_selected(EventKind::LogMessage));
    }
}
