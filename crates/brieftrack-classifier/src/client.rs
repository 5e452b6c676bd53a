// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! [`AnthropicClient`] makes exactly one call per [`AnthropicClient::send`]
//! and sorts every failure into an [`ApiError`] category. Retrying is the
//! caller's decision.

use std::time::Duration;

use brieftrack_core::BriefError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::debug;

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Why a single API call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// 5xx, 408 or 409.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    /// Any other non-success status.
    #[error("api error {status}: {message}")]
    Client { status: u16, message: String },
    /// The body of a successful response could not be read or decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Connection(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }
}

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    timeout: Duration,
    base_url: String,
}

impl AnthropicClient {
    /// Build a client with the authentication headers baked in.
    pub fn new(api_key: &str, api_version: &str, timeout: Duration) -> Result<Self, BriefError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| BriefError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                BriefError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BriefError::Classifier {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            timeout,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the endpoint URL (for tests against a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send one request, bounded by the configured timeout.
    pub async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, ApiError> {
        match tokio::time::timeout(self.timeout, self.send_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }

    async fn send_inner(&self, request: &MessageRequest) -> Result<MessageResponse, ApiError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(self.timeout)
                } else {
                    ApiError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(status = %status, "classification response received");

        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::Connection(format!("failed to read body: {e}")))?;
            return serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!("{}: {}", api_err.error.type_, api_err.error.message),
            Err(_) => body,
        };
        Err(classify_status(status, message))
    }
}

fn classify_status(status: StatusCode, message: String) -> ApiError {
    match status.as_u16() {
        429 => ApiError::RateLimited(message),
        code @ (408 | 409 | 500..) => ApiError::Server {
            status: code,
            message,
        },
        code => ApiError::Client {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new("test-api-key", "2023-06-01", Duration::from_secs(5))
            .unwrap()
            .with_base_url(base_url)
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 1024,
            system: "classify".into(),
            messages: vec![ApiMessage::user("hello")],
        }
    }

    fn text_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn send_success_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_body("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let resp = test_client(&server.uri()).send(&test_request()).await.unwrap();
        assert_eq!(resp.id, "msg_test");
        assert_eq!(resp.first_text(), Some("{}"));
    }

    #[tokio::test]
    async fn status_codes_are_categorized() {
        let cases = [
            (429, true),
            (500, true),
            (529, true),
            (408, true),
            (400, false),
            (401, false),
        ];
        for (status, transient) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                    "error": {"type": "some_error", "message": "nope"}
                })))
                .mount(&server)
                .await;
            let err = test_client(&server.uri())
                .send(&test_request())
                .await
                .unwrap_err();
            assert_eq!(err.is_transient(), transient, "status {status}: {err}");
            assert!(err.to_string().contains("some_error: nope"), "got {err}");
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_body("{}"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        let client = AnthropicClient::new("k", "2023-06-01", Duration::from_millis(50))
            .unwrap()
            .with_base_url(server.uri());
        let err = client.send(&test_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn api_errors_render_and_chain() {
        let err = ApiError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "timed out after 30s");

        let wrapped: Box<dyn std::error::Error + Send + Sync> = Box::new(ApiError::Server {
            status: 529,
            message: "overloaded_error: busy".into(),
        });
        assert_eq!(wrapped.to_string(), "server error 529: overloaded_error: busy");
    }

    #[tokio::test]
    async fn garbage_success_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let err = test_client(&server.uri())
            .send(&test_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let err = test_client("http://127.0.0.1:9")
            .send(&test_request())
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err}");
    }
}
