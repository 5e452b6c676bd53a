// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end intake tests.
//!
//! `TestHarness` assembles the intake stack on a temp SQLite database with a
//! [`MockClassifier`] and a [`RecordingNotifier`], and a configuration that
//! passes every readiness check.

use std::sync::Arc;

use brieftrack_config::BriefConfig;
use brieftrack_config::model::StorageConfig;
use brieftrack_core::{
    BriefError, CallbackEvent, InboundEvent, InboundMessage, OrderAction, StorageAdapter,
};
use brieftrack_intake::{ContextHandle, EventOutcome, IntakeService, Services};
use brieftrack_storage::{Database, SqliteStorage};

use crate::mock_classifier::MockClassifier;
use crate::recording_notifier::RecordingNotifier;

pub const CHAT_ID: i64 = -100_123;
pub const TOPIC_ID: i64 = 7;
pub const ADMIN_ID: i64 = 1;
pub const TEAMLEAD_ID: i64 = 2;
pub const MODEL_ID: i64 = 3;
/// A sender with no role.
pub const MEMBER_ID: i64 = 50;

/// A configuration that passes readiness with the ids above.
pub fn ready_config() -> BriefConfig {
    let mut config = BriefConfig::default();
    config.telegram.bot_token = Some("123456:test-token".into());
    config.telegram.chat_id = Some(CHAT_ID);
    config.telegram.topic_id = Some(TOPIC_ID);
    config.anthropic.api_key = Some("sk-ant-test".into());
    config.roles.admin_ids = vec![ADMIN_ID];
    config.roles.admin_usernames = vec!["boss".into()];
    config.roles.teamlead_ids = vec![TEAMLEAD_ID];
    config.roles.model_ids = vec![MODEL_ID];
    config.roles.model_usernames = vec!["model".into()];
    config
}

/// Builder for a [`TestHarness`].
pub struct TestHarnessBuilder {
    config: BriefConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ready_config(),
        }
    }

    /// Adjust the configuration before the harness is built.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut BriefConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub async fn build(self) -> Result<TestHarness, BriefError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| BriefError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let classifier = Arc::new(MockClassifier::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let context = ContextHandle::new(config);
        let services = Services {
            storage: Arc::clone(&storage),
            classifier: classifier.clone(),
            notifier: notifier.clone(),
            context: context.clone(),
        };
        let service = IntakeService::new(services.clone());

        Ok(TestHarness {
            classifier,
            notifier,
            storage,
            context,
            services,
            service,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete intake environment with mock adapters and temp storage.
pub struct TestHarness {
    pub classifier: Arc<MockClassifier>,
    pub notifier: Arc<RecordingNotifier>,
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    pub context: ContextHandle,
    pub services: Services,
    pub service: IntakeService,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with the default ready configuration.
    pub async fn new() -> Result<Self, BriefError> {
        Self::builder().build().await
    }

    pub fn db(&self) -> &Database {
        self.storage
            .database()
            .unwrap_or_else(|e| panic!("harness storage is initialized: {e}"))
    }

    /// A new message in the working topic from a member without a role.
    pub fn message(&self, message_id: i64, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: CHAT_ID,
            message_id,
            topic_id: Some(TOPIC_ID),
            text: Some(text.to_string()),
            sender_id: Some(MEMBER_ID),
            sender_username: Some("member".into()),
            sender_name: Some("Member".into()),
            ..Default::default()
        }
    }

    /// A command typed by `sender_id`, optionally replying to another
    /// message `(id, text)`.
    pub fn command(
        &self,
        sender_id: i64,
        message_id: i64,
        text: &str,
        reply_to: Option<(i64, &str)>,
    ) -> InboundMessage {
        InboundMessage {
            sender_id: Some(sender_id),
            sender_username: None,
            sender_name: Some(format!("user{sender_id}")),
            reply_to_message_id: reply_to.map(|(id, _)| id),
            reply_to_text: reply_to.map(|(_, text)| text.to_string()),
            ..self.message(message_id, text)
        }
    }

    /// A button press by `sender_id` on message `message_id`.
    pub fn callback(
        &self,
        sender_id: i64,
        order_id: i64,
        action: OrderAction,
        message_id: Option<i64>,
    ) -> CallbackEvent {
        CallbackEvent {
            callback_id: format!("cb-{sender_id}-{order_id}-{action}"),
            chat_id: CHAT_ID,
            message_id,
            topic_id: Some(TOPIC_ID),
            sender_id,
            sender_username: None,
            sender_name: Some(format!("user{sender_id}")),
            data: format!("order:{order_id}:{action}"),
        }
    }

    pub async fn send(&self, msg: InboundMessage) -> Result<EventOutcome, BriefError> {
        self.service.handle_event(InboundEvent::Message(msg)).await
    }

    pub async fn press(&self, cb: CallbackEvent) -> Result<EventOutcome, BriefError> {
        self.service.handle_event(InboundEvent::Callback(cb)).await
    }
}
