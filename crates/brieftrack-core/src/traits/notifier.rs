// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound chat transport trait.

use async_trait::async_trait;

use crate::error::BriefError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ActionButton, OutboundNotification};

/// Best-effort outbound operations. Callers log and alert on failure but
/// never roll back committed state because of it.
#[async_trait]
pub trait Notifier: PluginAdapter {
    /// Sends a notification, returning the transport's message id.
    async fn send(&self, notification: &OutboundNotification) -> Result<i64, BriefError>;

    /// Replaces the text and buttons of a previously sent message.
    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError>;

    /// Replaces only the buttons of a message. An empty slice removes them.
    async fn edit_buttons(
        &self,
        chat_id: i64,
        message_id: i64,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError>;

    /// Deletes a previously sent message.
    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), BriefError>;

    /// Acknowledges a button press with a short toast.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BriefError>;
}
