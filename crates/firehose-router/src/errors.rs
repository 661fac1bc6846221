// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while configuring the router. These are the only errors that ever leave the
/// pipeline; per-event failures are absorbed and reported through logs and counters.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Rejected Event Name [{name}] - Valid events: {valid}")]
    RejectedEventName { name: String, valid: String },

    #[error("Error parsing extra fields: {0}")]
    ExtraFields(String),

    #[error("Invalid forward URL '{0}'")]
    ForwardUrl(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
