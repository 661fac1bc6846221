// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-envelope routing: normalize, annotate, filter, forward.
//!
//! # Pipeline
//!
//! ```text
//!    Envelope
//!       │
//!       v
//!   ┌──────────────┐
//!   │  Normalize   │  unknown payload -> consume_unknown, dropped
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │   Annotate   │  envelope data, then extra fields
//!   └──────┬───────┘
//!          v  (only with cf_app_id)
//!   ┌──────────────┐
//!   │ App data +   │  first matching filter -> ignored
//!   │ filter chain │
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │   Forward    │  publish (+ publish_fail on error)
//!   └──────────────┘
//! ```
//!
//! `route` never fails. Every outcome is counted in [`Stats`] and also returned as a
//! [`RouteOutcome`] so callers can decide to log, retry or drop.

use crate::caching::AppCache;
use crate::config::RouterConfig;
use crate::envelope::{Envelope, EventKind};
use crate::errors::ConfigError;
use crate::events::Event;
use crate::extra_fields::ExtraFields;
use crate::filters::{compile_rules, Filter, FilterChain, IgnoredAppFilter, OrgAllowListFilter};
use crate::forwarder::{build_payload, ForwardError, Forwarder, HttpForwarder};
use crate::selection::{EventSelector, SelectedEvents};
use crate::stats::{StatKey, Stats};
use std::sync::Arc;
use tracing::{debug, error};

/// What happened to a routed envelope.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The collector accepted the event.
    Published,
    /// The event was sent but the send failed. It still counts as published.
    PublishFailed(ForwardError),
    /// A filter suppressed the event.
    Ignored { filter: String },
    /// The payload type is not understood; nothing was forwarded.
    Dropped,
}

impl RouteOutcome {
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, RouteOutcome::Published)
    }
}

pub struct EventRouter {
    cache: Arc<dyn AppCache>,
    stats: Arc<Stats>,
    extra_fields: ExtraFields,
    filters: FilterChain,
    forwarder: Arc<dyn Forwarder>,
    selector: EventSelector,
}

impl EventRouter {
    #[must_use]
    pub fn new(
        cache: Arc<dyn AppCache>,
        stats: Arc<Stats>,
        filters: FilterChain,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        EventRouter {
            cache,
            stats,
            extra_fields: ExtraFields::new(),
            filters,
            forwarder,
            selector: EventSelector::default(),
        }
    }

    /// Static fields merged into every event.
    #[must_use]
    pub fn with_extra_fields(mut self, extra_fields: ExtraFields) -> Self {
        self.extra_fields = extra_fields;
        self
    }

    /// Builds a router posting to the configured URL, with the configured event selection,
    /// extra fields and filters.
    pub fn from_config(
        config: &RouterConfig,
        cache: Arc<dyn AppCache>,
        stats: Arc<Stats>,
    ) -> Result<Self, ConfigError> {
        let forwarder = HttpForwarder::new(&config.forward_url, config.forward_timeout)?;
        let router = EventRouter::new(
            cache,
            stats,
            default_filters(config),
            Arc::new(forwarder),
        )
        .with_extra_fields(config.extra_fields.clone());
        router.setup_event_routing(&config.wanted_events)?;
        Ok(router)
    }

    /// Replaces the selected event types. On error the previous selection is kept.
    pub fn setup_event_routing(&self, wanted_events: &str) -> Result<(), ConfigError> {
        self.selector.configure(wanted_events).map(|_| ())
    }

    #[must_use]
    pub fn selected_events(&self) -> Arc<SelectedEvents> {
        self.selector.current()
    }

    /// Whether the ingestion side should hand envelopes of `kind` to [`EventRouter::route`].
    #[must_use]
    pub fn is_selected(&self, kind: EventKind) -> bool {
        self.selector.is_selected(kind)
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    #[must_use]
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub async fn route(&self, envelope: &Envelope) -> RouteOutcome {
        self.stats.inc(StatKey::Consume);

        let Some(mut event) = Event::from_envelope(envelope) else {
            debug!("Dropping envelope from {} with unsupported payload", envelope.origin);
            self.stats.inc(StatKey::ConsumeUnknown);
            return RouteOutcome::Dropped;
        };
        self.stats.inc(StatKey::consumed(event.kind));

        event.annotate_with_envelope_data(envelope);
        event.annotate_with_metadata(&self.extra_fields);

        if event.has_app_id() {
            event.annotate_with_app_data(self.cache.as_ref());
            if let Some(filter) = self.filters.first_match(&event) {
                debug!("{} event suppressed by filter {}", event.kind, filter);
                self.stats.inc(StatKey::Ignored);
                return RouteOutcome::Ignored {
                    filter: filter.to_string(),
                };
            }
        }

        let payload = build_payload(&event);
        let result = self.forwarder.forward(&payload).await;
        self.stats.inc(StatKey::Publish);

        match result {
            Ok(_) => RouteOutcome::Published,
            Err(e) => {
                error!("Failed to forward {} event: {}", event.kind, e);
                self.stats.inc(StatKey::PublishFail);
                RouteOutcome::PublishFailed(e)
            }
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("extra_fields", &self.extra_fields)
            .field("filters", &self.filters)
            .field("selected_events", &self.selector.current())
            .finish_non_exhaustive()
    }
}

/// Filters in the order they run: ignored apps, the org allow-list (when configured), then the
/// exclude rules.
#[must_use]
pub fn default_filters(config: &RouterConfig) -> FilterChain {
    let mut filters: Vec<Box<dyn Filter>> = vec![Box::new(IgnoredAppFilter)];
    if let Some(orgs) = &config.allowed_orgs {
        filters.push(Box::new(OrgAllowListFilter::from_csv(orgs)));
    }
    for rule in compile_rules(&config.processing_rules) {
        filters.push(Box::new(rule));
    }
    FilterChain::new(filters)
}
