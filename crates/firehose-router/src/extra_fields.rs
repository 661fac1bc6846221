// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Operator-supplied static fields attached to every forwarded event.

use crate::errors::ConfigError;
use std::collections::HashMap;

pub type ExtraFields = HashMap<String, String>;

/// Parses a comma-separated list of `key:value` pairs.
///
/// Whitespace around keys and values is trimmed and empty entries are skipped, so
/// `"env:prod, team:obs,"` yields `{env: prod, team: obs}`. An entry that is not exactly one
/// `key:value` pair, or that has an empty key, fails the whole parse.
///
/// ```
/// use firehose_router::extra_fields::parse_extra_fields;
///
/// let fields = parse_extra_fields("env:prod, team:obs").unwrap();
/// assert_eq!(fields.get("env").map(String::as_str), Some("prod"));
/// assert!(parse_extra_fields("env").is_err());
/// ```
pub fn parse_extra_fields(raw: &str) -> Result<ExtraFields, ConfigError> {
    let mut fields = ExtraFields::new();

    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let mut parts = pair.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) if !key.trim().is_empty() => {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => return Err(ConfigError::ExtraFields(pair.to_string())),
        }
    }

    Ok(fields)
}
