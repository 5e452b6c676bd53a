// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort outbound helpers. Delivery failures are logged and reported
//! to the caller, never propagated: committed state stays committed.

use brieftrack_core::{Notifier, OutboundNotification};
use brieftrack_storage::Order;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::cards;
use crate::context::RuntimeContext;

/// Send and return the message id, or `None` after logging the failure.
pub async fn send_logged(
    notifier: &dyn Notifier,
    notification: &OutboundNotification,
) -> Option<i64> {
    match notifier.send(notification).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!(
                chat_id = notification.chat_id,
                topic_id = ?notification.topic_id,
                error = %e,
                "outbound send failed"
            );
            None
        }
    }
}

/// Re-render the order's bound card. `false` if there is no card or the edit
/// failed.
pub async fn refresh_card(
    notifier: &dyn Notifier,
    ctx: &RuntimeContext,
    order: &Order,
    now: DateTime<Utc>,
) -> bool {
    let Some(card_id) = order.bot_message_id else {
        debug!(order_id = order.id, "no card bound, refresh skipped");
        return false;
    };
    let text = cards::render_card(order, ctx.local_date(now));
    let buttons = cards::card_buttons(order);
    match notifier.edit(order.chat_id, card_id, &text, &buttons).await {
        Ok(()) => true,
        Err(e) => {
            error!(order_id = order.id, message_id = card_id, error = %e, "card refresh failed");
            false
        }
    }
}

/// Remove the inline keyboard of a message.
pub async fn clear_buttons(notifier: &dyn Notifier, chat_id: i64, message_id: i64) -> bool {
    match notifier.edit_buttons(chat_id, message_id, &[]).await {
        Ok(()) => true,
        Err(e) => {
            debug!(chat_id, message_id, error = %e, "could not clear buttons");
            false
        }
    }
}

/// Operator alert in the given topic, mentioning every admin.
pub async fn alert_admins(
    notifier: &dyn Notifier,
    ctx: &RuntimeContext,
    chat_id: i64,
    topic_id: Option<i64>,
    reply_to: Option<i64>,
    text: &str,
) -> bool {
    let mentions = ctx.roles.admins.mentions("admin");
    let body = if mentions.is_empty() {
        format!("⚠️ {text}")
    } else {
        format!("⚠️ {text}\n{mentions}")
    };
    let mut notification = OutboundNotification::text(chat_id, topic_id, body);
    notification.reply_to_message_id = reply_to;
    send_logged(notifier, &notification).await.is_some()
}
