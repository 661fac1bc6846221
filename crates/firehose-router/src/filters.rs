// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Suppression filters applied to application events.
//!
//! A [`FilterChain`] runs its filters in order and stops at the first one that returns `true`;
//! that event is not forwarded. The chain is only consulted for events that carry an
//! application id.
//!
//! # Built-in filters
//!
//! - [`IgnoredAppFilter`]: drop events of applications that opted out of forwarding
//! - [`OrgAllowListFilter`]: only forward events of the listed organizations
//! - [`ExcludeAtMatchFilter`]: drop events whose message (or a named field) matches a regex
//!
//! Exclude rules can be configured as JSON:
//!
//! ```json
//! [
//!   {"name": "health_checks", "pattern": "GET /health"},
//!   {"name": "staging", "field": "cf_space_name", "pattern": "^staging$"}
//! ]
//! ```

use crate::events::{Event, FieldValue, IGNORED_APP_FIELD, ORG_NAME_FIELD};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::error;

pub trait Filter: Send + Sync {
    /// Name used when reporting which filter suppressed an event.
    fn name(&self) -> &str;

    /// Returns `true` when the event must not be forwarded.
    fn evaluate(&self, event: &Event) -> bool;
}

/// A named closure filter.
pub struct FnFilter<F> {
    name: String,
    predicate: F,
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, event: &Event) -> bool {
        (self.predicate)(event)
    }
}

/// Wraps a predicate into a [`Filter`].
pub fn filter_fn<F>(name: impl Into<String>, predicate: F) -> FnFilter<F>
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    FnFilter {
        name: name.into(),
        predicate,
    }
}

/// Suppresses events whose application is flagged as ignored in the app cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoredAppFilter;

impl Filter for IgnoredAppFilter {
    fn name(&self) -> &str {
        "ignored_app"
    }

    fn evaluate(&self, event: &Event) -> bool {
        matches!(event.get(IGNORED_APP_FIELD), Some(FieldValue::Bool(true)))
    }
}

/// Suppresses events that do not belong to one of the allowed organizations.
///
/// Events whose org was not resolved by enrichment pass through.
#[derive(Clone, Debug)]
pub struct OrgAllowListFilter {
    orgs: HashSet<String>,
}

impl OrgAllowListFilter {
    pub fn new<I, S>(orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            orgs: orgs.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the filter from a comma-separated list, ignoring blank entries.
    #[must_use]
    pub fn from_csv(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|org| !org.is_empty()),
        )
    }

    #[must_use]
    pub fn orgs(&self) -> &HashSet<String> {
        &self.orgs
    }
}

impl Filter for OrgAllowListFilter {
    fn name(&self) -> &str {
        "org_allow_list"
    }

    fn evaluate(&self, event: &Event) -> bool {
        event
            .get(ORG_NAME_FIELD)
            .is_some_and(|org| !self.orgs.contains(&org.to_string()))
    }
}

/// A user-defined exclude rule, before regex compilation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProcessingRule {
    pub name: String,
    pub pattern: String,
    /// Field to match against. The event message when absent.
    #[serde(default)]
    pub field: Option<String>,
}

/// Suppresses events whose message, or the configured field, matches a regex.
#[derive(Clone, Debug)]
pub struct ExcludeAtMatchFilter {
    name: String,
    field: Option<String>,
    regex: regex::Regex,
}

impl ExcludeAtMatchFilter {
    pub fn new(rule: &ProcessingRule) -> Result<Self, regex::Error> {
        Ok(Self {
            name: rule.name.clone(),
            field: rule.field.clone(),
            regex: regex::Regex::new(&rule.pattern)?,
        })
    }
}

impl Filter for ExcludeAtMatchFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, event: &Event) -> bool {
        match &self.field {
            None => self.regex.is_match(&event.message),
            Some(field) => event
                .get(field)
                .is_some_and(|value| self.regex.is_match(&value.to_string())),
        }
    }
}

/// Parses exclude rules from a JSON array.
///
/// Lenient: an unparsable document yields no rules, and individual invalid entries are
/// logged and skipped, so a bad rule never keeps the router from starting.
#[must_use]
pub fn parse_processing_rules(raw: &str) -> Vec<ProcessingRule> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            error!("Failed to parse processing rules: {}, ignoring", e);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(rule) => Some(rule),
            Err(e) => {
                error!("Failed to parse processing rule: {}, ignoring", e);
                None
            }
        })
        .collect()
}

/// Compiles rules into filters, skipping the ones whose pattern is not a valid regex.
#[must_use]
pub fn compile_rules(rules: &[ProcessingRule]) -> Vec<ExcludeAtMatchFilter> {
    rules
        .iter()
        .filter_map(|rule| match ExcludeAtMatchFilter::new(rule) {
            Ok(filter) => Some(filter),
            Err(e) => {
                error!("Failed to compile rule '{}': {}, ignoring", rule.name, e);
                None
            }
        })
        .collect()
}

/// Ordered, immutable list of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    #[must_use]
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// Runs the filters in order and returns the name of the first one that suppresses the
    /// event. Later filters are not evaluated.
    #[must_use]
    pub fn first_match(&self, event: &Event) -> Option<&str> {
        self.filters
            .iter()
            .find(|filter| filter.evaluate(event))
            .map(|filter| filter.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}
