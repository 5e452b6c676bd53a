// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of Telegram updates into transport-neutral events.

use brieftrack_core::{CallbackEvent, InboundMessage};
use teloxide::prelude::*;
use teloxide::types::{ThreadId, User};

fn thread_id(thread: Option<ThreadId>) -> Option<i64> {
    thread.map(|t| i64::from(t.0.0))
}

fn sender_id(user: &User) -> Option<i64> {
    i64::try_from(user.id.0).ok()
}

/// Converts a new or edited message. The caption stands in for the text of
/// media messages.
pub fn to_inbound_message(msg: &Message, is_edit: bool) -> InboundMessage {
    let from = msg.from.as_ref();
    InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: i64::from(msg.id.0),
        topic_id: thread_id(msg.thread_id),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        sender_id: from.and_then(sender_id),
        sender_username: from.and_then(|u| u.username.clone()),
        sender_name: from.map(User::full_name),
        has_photo: msg.photo().is_some(),
        is_edit,
        is_forwarded: msg.forward_origin().is_some(),
        reply_to_message_id: msg.reply_to_message().map(|r| i64::from(r.id.0)),
        reply_to_text: msg
            .reply_to_message()
            .and_then(|r| r.text().or_else(|| r.caption()))
            .map(str::to_string),
    }
}

/// Converts a button press. Presses without data or without an attached
/// message (inline mode) are not ours and yield `None`.
pub fn to_callback_event(query: &CallbackQuery) -> Option<CallbackEvent> {
    let data = query.data.clone()?;
    let message = query.message.as_ref()?;
    Some(CallbackEvent {
        callback_id: query.id.0.clone(),
        chat_id: message.chat().id.0,
        message_id: Some(i64::from(message.id().0)),
        topic_id: query.regular_message().and_then(|m| thread_id(m.thread_id)),
        sender_id: sender_id(&query.from)?,
        sender_username: query.from.username.clone(),
        sender_name: Some(query.from.full_name()),
        data,
    })
}
