// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Monotonic pipeline counters.
//!
//! Every routing outcome bumps exactly one counter per stage. Counters are lock-free atomics so
//! concurrent `route` calls never contend; a [`StatsSnapshot`] reads them all for reporting.

use crate::envelope::EventKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Names of the counters kept by [`Stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatKey {
    /// Every envelope handed to the router.
    Consume,
    ConsumeHttpStartStop,
    ConsumeLogMessage,
    ConsumeValueMetric,
    ConsumeCounterEvent,
    ConsumeError,
    ConsumeContainerMetric,
    /// Envelopes whose payload type is not understood. They are dropped.
    ConsumeUnknown,
    /// Events suppressed by the filter chain.
    Ignored,
    /// Events handed to the forwarder, whether or not the send succeeded.
    Publish,
    /// Subset of `Publish` whose send failed.
    PublishFail,
}

const STAT_COUNT: usize = 11;

impl StatKey {
    pub const ALL: [StatKey; STAT_COUNT] = [
        StatKey::Consume,
        StatKey::ConsumeHttpStartStop,
        StatKey::ConsumeLogMessage,
        StatKey::ConsumeValueMetric,
        StatKey::ConsumeCounterEvent,
        StatKey::ConsumeError,
        StatKey::ConsumeContainerMetric,
        StatKey::ConsumeUnknown,
        StatKey::Ignored,
        StatKey::Publish,
        StatKey::PublishFail,
    ];

    /// The per-type consume counter for `kind`.
    #[must_use]
    pub fn consumed(kind: EventKind) -> Self {
        match kind {
            EventKind::HttpStartStop => StatKey::ConsumeHttpStartStop,
            EventKind::LogMessage => StatKey::ConsumeLogMessage,
            EventKind::ValueMetric => StatKey::ConsumeValueMetric,
            EventKind::CounterEvent => StatKey::ConsumeCounterEvent,
            EventKind::Error => StatKey::ConsumeError,
            EventKind::ContainerMetric => StatKey::ConsumeContainerMetric,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatKey::Consume => "consume",
            StatKey::ConsumeHttpStartStop => "consume_http_start_stop",
            StatKey::ConsumeLogMessage => "consume_log_message",
            StatKey::ConsumeValueMetric => "consume_value_metric",
            StatKey::ConsumeCounterEvent => "consume_counter_event",
            StatKey::ConsumeError => "consume_error",
            StatKey::ConsumeContainerMetric => "consume_container_metric",
            StatKey::ConsumeUnknown => "consume_unknown",
            StatKey::Ignored => "ignored",
            StatKey::Publish => "publish",
            StatKey::PublishFail => "publish_fail",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    counters: [AtomicU64; STAT_COUNT],
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, key: StatKey) {
        self.counters[key.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self, key: StatKey) -> u64 {
        self.counters[key.index()].load(Ordering::Relaxed)
    }

    /// Reads every counter. Counters are read one by one, so a snapshot taken while events are
    /// flowing is not a single consistent cut.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: StatKey::ALL
                .iter()
                .map(|key| (key.as_str(), self.get(*key)))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: std::collections::BTreeMap<&'static str, u64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_keys_map_to_distinct_slots() {
        for (i, key) in StatKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
        }
    }

    #[test]
    fn test_inc_only_touches_one_counter() {
        let stats = Stats::new();
        stats.inc(StatKey::Ignored);
        stats.inc(StatKey::Ignored);

        assert_eq!(stats.get(StatKey::Ignored), 2);
        for key in StatKey::ALL {
            if key != StatKey::Ignored {
                assert_eq!(stats.get(key), 0, "{} should be untouched", key.as_str());
            }
        }
    }

    #[test]
    fn test_consumed_key_per_kind() {
        assert_eq!(
            StatKey::consumed(EventKind::LogMessage),
            StatKey::ConsumeLogMessage
        );
        assert_eq!(
            StatKey::consumed(EventKind::ContainerMetric),
            StatKey::ConsumeContainerMetric
        );
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(Stats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.inc(StatKey::Publish);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get(StatKey::Publish), 8000);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let stats = Stats::new();
        stats.inc(StatKey::Consume);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["consume"], 1);
        assert_eq!(json["publish"], 0);
    }
}
