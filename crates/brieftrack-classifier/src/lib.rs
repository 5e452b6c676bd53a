// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic-backed brief classifier.
//!
//! [`BriefClassifier`] implements [`Classifier`]: one prompt per message,
//! a bounded inline retry loop for transient API failures, and strict
//! validation of the JSON verdict.

pub mod client;
pub mod normalize;
pub mod prompt;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use brieftrack_config::model::AnthropicConfig;
use brieftrack_core::{
    AdapterType, BriefError, Classification, ClassifyError, Classifier, HealthStatus,
    PluginAdapter,
};
use tracing::{error, info, warn};

use crate::client::{AnthropicClient, ApiError};
use crate::types::{ApiMessage, MessageRequest};

/// Classification adapter backed by the Anthropic Messages API.
pub struct BriefClassifier {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    max_inline_retries: u32,
    retry_base_delay: Duration,
}

impl BriefClassifier {
    /// Build from configuration. Fails if no API key is configured.
    pub fn new(config: &AnthropicConfig) -> Result<Self, BriefError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BriefError::Config("anthropic.api_key is not set".to_string()))?;
        let client = AnthropicClient::new(
            api_key,
            &config.api_version,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, "classifier initialized");
        Ok(Self::with_client(client, config))
    }

    /// Build around an existing client (tests point it at a mock server).
    pub fn with_client(client: AnthropicClient, config: &AnthropicConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_inline_retries: config.max_inline_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    fn request(&self, text: &str, has_photo: bool) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: prompt::SYSTEM_PROMPT.to_string(),
            messages: vec![ApiMessage::user(prompt::user_message(text, has_photo))],
        }
    }

    /// Delay before the attempt following `attempt` (0-based).
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
impl PluginAdapter for BriefClassifier {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, BriefError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BriefError> {
        Ok(())
    }
}

#[async_trait]
impl Classifier for BriefClassifier {
    async fn classify(
        &self,
        text: &str,
        has_photo: bool,
    ) -> Result<Classification, ClassifyError> {
        let request = self.request(text, has_photo);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..=self.max_inline_retries {
            match self.client.send(&request).await {
                Ok(response) => {
                    let Some(raw) = response.first_text() else {
                        error!("classifier returned no text block");
                        return Err(ClassifyError::permanent("empty response"));
                    };
                    let classification = normalize::parse_reply(raw).map_err(|reason| {
                        error!(%reason, "classifier reply rejected");
                        ClassifyError::permanent(reason)
                    })?;
                    info!(
                        is_task = classification.is_task,
                        confidence = classification.confidence,
                        "message classified"
                    );
                    return Ok(classification);
                }
                Err(e) if e.is_transient() => {
                    let delay = self.backoff(attempt);
                    warn!(error = %e, attempt = attempt + 1, retry_in_ms = delay.as_millis() as u64, "transient classifier error");
                    last_error = Some(e);
                    if attempt < self.max_inline_retries {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "non-retryable classifier error");
                    return Err(ClassifyError::permanent(e.to_string()));
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        error!(error = %message, "inline retries exhausted");
        Err(ClassifyError::transient(message))
    }
}
