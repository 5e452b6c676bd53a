// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event and result types exchanged between the transport, the classifier,
//! and the intake core.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::lifecycle::{Platform, Priority};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Classifier,
    Storage,
}

/// A message (or message edit) observed in the chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    /// Forum topic (thread) id, if the chat has topics.
    pub topic_id: Option<i64>,
    /// Message text, or the media caption when there is no text.
    pub text: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    /// Human-readable sender name (first and last name).
    pub sender_name: Option<String>,
    pub has_photo: bool,
    pub is_edit: bool,
    pub is_forwarded: bool,
    pub reply_to_message_id: Option<i64>,
    /// Text (or caption) of the replied-to message.
    pub reply_to_text: Option<String>,
}

impl InboundMessage {
    /// Text with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn is_command(&self) -> bool {
        self.text.as_deref().is_some_and(|t| t.starts_with('/'))
    }

    /// Command name and argument tail, with any `@botname` suffix dropped:
    /// `"/revert@brief_bot 12"` gives `("revert", "12")`.
    pub fn command(&self) -> Option<(&str, &str)> {
        let text = self.text.as_deref()?.trim().strip_prefix('/')?;
        let (head, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let name = head.split('@').next().unwrap_or(head);
        (!name.is_empty()).then_some((name, args.trim()))
    }

    /// In forum chats every message replies to the topic root; such a reply is
    /// not a real reply.
    pub fn is_topic_root_reply(&self) -> bool {
        match (self.reply_to_message_id, self.topic_id) {
            (Some(reply_to), Some(topic)) => reply_to == topic,
            _ => false,
        }
    }

    /// A reply to some other message, which belongs to a different flow.
    pub fn is_real_reply(&self) -> bool {
        self.reply_to_message_id.is_some() && !self.is_topic_root_reply()
    }
}

/// A press of an inline button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Transport id used to acknowledge the press.
    pub callback_id: String,
    pub chat_id: i64,
    /// The message the pressed button belongs to.
    pub message_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub sender_id: i64,
    pub sender_username: Option<String>,
    pub sender_name: Option<String>,
    pub data: String,
}

/// Everything the transport delivers to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// A new or edited message (see [`InboundMessage::is_edit`]).
    Message(InboundMessage),
    Callback(CallbackEvent),
}

/// Operator action carried by an inline button.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    ConfirmBrief,
    NotTask,
    NotTaskConfirm,
    NotTaskCancel,
    Take,
    Finish,
    Delivered,
    Postpone,
    #[strum(serialize = "postpone_1d")]
    #[serde(rename = "postpone_1d")]
    Postpone1d,
    #[strum(serialize = "postpone_3d")]
    #[serde(rename = "postpone_3d")]
    Postpone3d,
    #[strum(serialize = "postpone_7d")]
    #[serde(rename = "postpone_7d")]
    Postpone7d,
    CancelPostpone,
}

/// An inline button keyed by `(order_id, action)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub order_id: i64,
    pub action: OrderAction,
    pub label: String,
}

impl ActionButton {
    pub fn new(order_id: i64, action: OrderAction, label: impl Into<String>) -> Self {
        Self {
            order_id,
            action,
            label: label.into(),
        }
    }

    /// Encoded as `order:{id}:{action}`.
    pub fn callback_data(&self) -> String {
        format!("order:{}:{}", self.order_id, self.action)
    }
}

/// Decode `order:{id}:{action}` callback data.
pub fn parse_callback_data(data: &str) -> Option<(i64, OrderAction)> {
    let mut parts = data.split(':');
    let (prefix, id, action) = (parts.next()?, parts.next()?, parts.next()?);
    if prefix != "order" || parts.next().is_some() {
        return None;
    }
    Some((id.parse().ok()?, action.parse().ok()?))
}

/// Rendered notification for the chat transport. Buttons are laid out one
/// row per inner vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    pub chat_id: i64,
    pub topic_id: Option<i64>,
    pub reply_to_message_id: Option<i64>,
    pub text: String,
    pub buttons: Vec<Vec<ActionButton>>,
}

impl OutboundNotification {
    pub fn text(chat_id: i64, topic_id: Option<i64>, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            topic_id,
            reply_to_message_id: None,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<ActionButton>>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// Structured order data extracted by the classifier, already normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefFields {
    pub task_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub platform: Option<Platform>,
    pub priority: Priority,
    pub amount_total: Option<f64>,
    pub amount_paid: Option<f64>,
    pub amount_remaining: Option<f64>,
    pub payment_note: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub outfit: Option<String>,
    pub notes: Option<String>,
    pub fan_link: Option<String>,
    pub fan_name: Option<String>,
}

/// Validated classifier verdict. `data` is always present when `is_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_task: bool,
    pub confidence: f64,
    pub data: Option<BriefFields>,
    pub reason: Option<String>,
}

impl Classification {
    /// A task verdict at or above `threshold`, with its data.
    pub fn accepted_fields(&self, threshold: f64) -> Option<&BriefFields> {
        if self.is_task && self.confidence >= threshold {
            self.data.as_ref()
        } else {
            None
        }
    }
}
