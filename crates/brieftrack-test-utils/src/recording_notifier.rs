// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that records every outbound operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use brieftrack_core::{
    ActionButton, AdapterType, BriefError, HealthStatus, Notifier, OutboundNotification,
    PluginAdapter,
};

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Send {
        message_id: i64,
        notification: OutboundNotification,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
        buttons: Vec<Vec<ActionButton>>,
    },
    EditButtons {
        chat_id: i64,
        message_id: i64,
        buttons: Vec<Vec<ActionButton>>,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    AnswerCallback {
        callback_id: String,
        text: String,
    },
}

/// Records calls and hands out increasing message ids starting at 1000.
/// Sends and edits can be made to fail for error-path tests; failed calls
/// are not recorded.
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<NotifierCall>>>,
    next_id: AtomicI64,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI64::new(1000),
            fail_sends: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
        }
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    /// Every notification sent, in order.
    pub async fn sent(&self) -> Vec<OutboundNotification> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Send { notification, .. } => Some(notification.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(message_id, text)` of every full edit.
    pub async fn edits(&self) -> Vec<(i64, String)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Edit {
                    message_id, text, ..
                } => Some((*message_id, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn deleted(&self) -> Vec<i64> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::Delete { message_id, .. } => Some(*message_id),
                _ => None,
            })
            .collect()
    }

    pub async fn answers(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                NotifierCall::AnswerCallback { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: NotifierCall) {
        self.calls.lock().await.push(call);
    }

    fn channel_error(what: &str) -> BriefError {
        BriefError::Channel {
            message: format!("injected {what} failure"),
            source: None,
        }
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for RecordingNotifier {
    fn name(&self) -> &str {
        "recording-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, BriefError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BriefError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &OutboundNotification) -> Result<i64, BriefError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::channel_error("send"));
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(NotifierCall::Send {
            message_id,
            notification: notification.clone(),
        })
        .await;
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(Self::channel_error("edit"));
        }
        self.record(NotifierCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        })
        .await;
        Ok(())
    }

    async fn edit_buttons(
        &self,
        chat_id: i64,
        message_id: i64,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(Self::channel_error("edit"));
        }
        self.record(NotifierCall::EditButtons {
            chat_id,
            message_id,
            buttons: buttons.to_vec(),
        })
        .await;
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), BriefError> {
        self.record(NotifierCall::Delete {
            chat_id,
            message_id,
        })
        .await;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BriefError> {
        self.record(NotifierCall::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_numbers_sends() {
        let notifier = RecordingNotifier::new();
        let first = notifier
            .send(&OutboundNotification::text(1, None, "a"))
            .await
            .unwrap();
        let second = notifier
            .send(&OutboundNotification::text(1, None, "b"))
            .await
            .unwrap();
        assert_eq!((first, second), (1000, 1001));
        assert_eq!(notifier.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_not_recorded() {
        let notifier = RecordingNotifier::new();
        notifier.fail_sends(true);
        assert!(
            notifier
                .send(&OutboundNotification::text(1, None, "a"))
                .await
                .is_err()
        );
        notifier.fail_edits(true);
        assert!(notifier.edit(1, 2, "x", &[]).await.is_err());
        assert!(notifier.calls().await.is_empty());
    }
}
