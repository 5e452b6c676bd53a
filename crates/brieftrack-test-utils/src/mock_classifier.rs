// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock classifier returning scripted outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use brieftrack_core::{
    AdapterType, BriefError, BriefFields, Classification, ClassifyError, Classifier, HealthStatus,
    PluginAdapter,
};

type Outcome = Result<Classification, ClassifyError>;

/// Outcomes are popped from a FIFO queue. When the queue is empty every
/// call answers "not a brief".
pub struct MockClassifier {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push(&self, outcome: Outcome) {
        self.outcomes.lock().await.push_back(outcome);
    }

    /// Queue a task verdict.
    pub async fn push_brief(&self, fields: BriefFields, confidence: f64) {
        self.push(Ok(Self::brief(fields, confidence))).await;
    }

    pub async fn push_not_brief(&self) {
        self.push(Ok(Self::not_brief())).await;
    }

    pub async fn push_transient(&self, message: &str) {
        self.push(Err(ClassifyError::transient(message))).await;
    }

    pub async fn push_permanent(&self, message: &str) {
        self.push(Err(ClassifyError::permanent(message))).await;
    }

    pub fn brief(fields: BriefFields, confidence: f64) -> Classification {
        Classification {
            is_task: true,
            confidence,
            data: Some(fields),
            reason: None,
        }
    }

    pub fn not_brief() -> Classification {
        Classification {
            is_task: false,
            confidence: 0.95,
            data: None,
            reason: Some("not_a_brief".to_string()),
        }
    }

    /// `(text, has_photo)` of every call so far.
    pub async fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
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
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str, has_photo: bool) -> Outcome {
        self.calls.lock().await.push((text.to_string(), has_photo));
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Self::not_brief()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pops_in_order_then_defaults() {
        let mock = MockClassifier::new();
        mock.push_transient("429").await;
        mock.push_brief(BriefFields::default(), 0.9).await;

        assert!(mock.classify("a", false).await.unwrap_err().is_transient());
        assert!(mock.classify("b", true).await.unwrap().is_task);
        assert!(!mock.classify("c", false).await.unwrap().is_task);
        assert_eq!(mock.calls().await[1], ("b".to_string(), true));
    }
}
