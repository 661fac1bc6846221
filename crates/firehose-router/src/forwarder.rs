// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shipping of finalized events to the downstream collector.
//!
//! Each event becomes one flat JSON object whose values are all strings, with the event
//! message under `"message"`:
//!
//! ```json
//! {"cf_app_id": "123", "status_code": "200", "message": "hello"}
//! ```
//!
//! It is sent as a single `POST` with `Content-Type: application/json`. There is no batching and
//! no retry: a failed send is reported to the caller as a [`ForwardError`] and the event is
//! gone.

use crate::errors::ConfigError;
use crate::events::Event;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const MESSAGE_KEY: &str = "message";

/// The string-only field map sent for one event.
pub type Payload = HashMap<String, String>;

/// Renders every field to a string and adds the message. The message wins over a field that
/// happens to be called `message`.
#[must_use]
pub fn build_payload(event: &Event) -> Payload {
    let mut payload: Payload = event
        .fields
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect();
    payload.insert(MESSAGE_KEY.to_string(), event.message.clone());
    payload
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The payload could not be serialized. Nothing was sent.
    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    /// The collector could not be reached, or answered with a non-success status.
    #[error("Error shipping event: {0:?} {1}")]
    Destination(Option<StatusCode>, String),
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Sends one payload, returning the collector's status on success.
    async fn forward(&self, payload: &Payload) -> Result<StatusCode, ForwardError>;
}

/// Forwarder posting JSON payloads to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpForwarder {
    /// Builds a forwarder for `url`. `timeout` bounds each whole request; without it a stalled
    /// collector would block the routing call indefinitely.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = parse_forward_url(url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_keepalive(Some(Duration::from_secs(120)))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("unable to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, payload: &Payload) -> Result<StatusCode, ForwardError> {
        let body = serde_json::to_vec(payload).map_err(|e| ForwardError::Payload(e.to_string()))?;

        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .await
            .map_err(|e| ForwardError::Destination(e.status(), e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!("Forwarded event to {}: {}", self.url, status);
            Ok(status)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ForwardError::Destination(Some(status), body))
        }
    }
}

/// Validates the collector URL: it must parse and use `http` or `https`.
pub fn parse_forward_url(url: &str) -> Result<reqwest::Url, ConfigError> {
    let parsed =
        reqwest::Url::parse(url.trim()).map_err(|_| ConfigError::ForwardUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(ConfigError::ForwardUrl(url.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::envelope::EventKind;

    #[test]
    fn test_build_payload_adds_message() {
        let mut event = Event::new(EventKind::LogMessage);
        event.set("cf_app_id", "123");
        event.message = "hello".to_string();

        let payload = build_payload(&event);
        assert_eq!(
            payload,
            HashMap::from([
                ("cf_app_id".to_string(), "123".to_string()),
                ("message".to_string(), "hello".to_string()),
            ])
        );
    }

    #[test]
    fn test_build_payload_stringifies_values() {
        let mut event = Event::new(EventKind::HttpStartStop);
        event.set("status_code", 404);
        event.set("duration_ms", 12_i64);
        event.set("cpu_percentage", 0.25);
        event.set("cf_ignored_app", false);
        event.set("bytes", 10_u64);

        let payload = build_payload(&event);
        assert_eq!(payload["status_code"], "404");
        assert_eq!(payload["duration_ms"], "12");
        assert_eq!(payload["cpu_percentage"], "0.25");
        assert_eq!(payload["cf_ignored_app"], "false");
        assert_eq!(payload["bytes"], "10");
        assert_eq!(payload["message"], "");
    }

    #[test]
    fn test_message_overrides_message_field() {
        let mut event = Event::new(EventKind::Error);
        event.set("message", "from field");
        event.message = "from event".to_string();
        assert_eq!(build_payload(&event)["message"], "from event");
    }

    #[test]
    fn test_parse_forward_url() {
        assert!(parse_forward_url("http://localhost:8080/events").is_ok());
        assert!(parse_forward_url(" https://collector.example.com ").is_ok());
        assert_eq!(
            parse_forward_url("ftp://example.com").unwrap_err(),
            ConfigError::ForwardUrl("ftp://example.com".to_string())
        );
        assert!(parse_forward_url("").is_err());
        assert!(parse_forward_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_forward_posts_exact_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("Content-Type", "application/json")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"cf_app_id": "123", "message": "hello"}),
            ))
            .with_status(202)
            .create_async()
            .await;

        let mut event = Event::new(EventKind::LogMessage);
        event.set("cf_app_id", "123");
        event.message = "hello".to_string();

        let forwarder = HttpForwarder::new(&server.url(), Duration::from_secs(5)).unwrap();
        let status = forwarder.forward(&build_payload(&event)).await.unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_non_success_status_is_destination_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let forwarder = HttpForwarder::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = forwarder.forward(&Payload::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ForwardError::Destination(Some(StatusCode::SERVICE_UNAVAILABLE), ref body) if body == "busy"
        ));
    }

    #[test]
    fn test_forward_error_display() {
        let err = ForwardError::Destination(Some(StatusCode::BAD_GATEWAY), "down".to_string());
        assert_eq!(err.to_string(), "Error shipping event: Some(502) down");
    }
}
