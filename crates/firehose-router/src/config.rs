// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::ConfigError;
use crate::extra_fields::{parse_extra_fields, ExtraFields};
use crate::filters::{parse_processing_rules, ProcessingRule};
use crate::forwarder::parse_forward_url;
use crate::selection::SelectedEvents;
use std::env;
use std::time::Duration;

const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 30;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Startup configuration of the router, built once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Collector URL events are posted to
    pub forward_url: String,
    /// Comma-separated event types to consume; blank means `LogMessage` only
    pub wanted_events: String,
    /// Static `key:value` fields added to every event
    pub extra_fields: ExtraFields,
    /// Timeout of each forward request
    pub forward_timeout: Duration,
    /// Organizations whose events are forwarded; `None` forwards every organization
    pub allowed_orgs: Option<String>,
    /// Exclude rules applied to application events
    pub processing_rules: Vec<ProcessingRule>,
    /// How often the forwarder logs its counters
    pub stats_interval: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            forward_url: String::new(),
            wanted_events: String::new(),
            extra_fields: ExtraFields::new(),
            forward_timeout: Duration::from_secs(DEFAULT_FORWARD_TIMEOUT_SECS),
            allowed_orgs: None,
            processing_rules: Vec::new(),
            stats_interval: Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS),
            log_level: "info".to_string(),
        }
    }
}

impl RouterConfig {
    /// Reads the configuration from `FIREHOSE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let forward_url = env::var("FIREHOSE_FORWARD_URL").unwrap_or_default();
        let wanted_events = env::var("FIREHOSE_EVENTS").unwrap_or_default();
        let extra_fields = parse_extra_fields(&env::var("FIREHOSE_EXTRA_FIELDS").unwrap_or_default())?;
        let forward_timeout = Duration::from_secs(
            env::var("FIREHOSE_FORWARD_TIMEOUT")
                .ok()
                .and_then(|secs| secs.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_FORWARD_TIMEOUT_SECS),
        );
        let allowed_orgs = env::var("FIREHOSE_ORGS")
            .ok()
            .filter(|orgs| !orgs.trim().is_empty());
        let processing_rules = env::var("FIREHOSE_PROCESSING_RULES")
            .map(|raw| parse_processing_rules(&raw))
            .unwrap_or_default();
        let stats_interval = Duration::from_secs(
            env::var("FIREHOSE_STATS_INTERVAL")
                .ok()
                .and_then(|secs| secs.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
        );
        let log_level = env::var("FIREHOSE_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            forward_url,
            wanted_events,
            extra_fields,
            forward_timeout,
            allowed_orgs,
            processing_rules,
            stats_interval,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_forward_url(&self.forward_url)?;
        SelectedEvents::parse(&self.wanted_events)?;

        if self.forward_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "FIREHOSE_FORWARD_TIMEOUT must be greater than 0".to_string(),
            ));
        }

        if self.stats_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "FIREHOSE_STATS_INTERVAL must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
