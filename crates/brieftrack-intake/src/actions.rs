// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator actions: inline-button presses on order cards and the typed
//! date reply that completes a postpone.

use std::sync::{Arc, LazyLock};

use brieftrack_core::{
    BriefError, CallbackEvent, InboundMessage, OrderAction, OrderStatus, OutboundNotification,
    parse_callback_data,
};
use brieftrack_storage::queries::orders;
use brieftrack_storage::{Actor, Order};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::cards::{self, order_ref};
use crate::context::{RoleDirectory, RuntimeContext, Sender};
use crate::outbound::{clear_buttons, refresh_card, send_logged};
use crate::Services;
use crate::pending::{Lookup, PendingPostpone, PendingState};

static DATE_REPLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})(?:\.(\d{4}))?$").unwrap());

/// Who may press a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Model,
    Manager,
    ManagerOrModel,
}

impl Permission {
    pub fn for_action(action: OrderAction) -> Self {
        use OrderAction::*;
        match action {
            Take | Finish => Permission::Model,
            ConfirmBrief | NotTask | NotTaskConfirm | NotTaskCancel | Delivered => {
                Permission::Manager
            }
            Postpone | Postpone1d | Postpone3d | Postpone7d | CancelPostpone => {
                Permission::ManagerOrModel
            }
        }
    }

    pub fn allows(self, roles: &RoleDirectory, sender: &Sender) -> bool {
        match self {
            Permission::Model => roles.is_model(sender),
            Permission::Manager => roles.is_admin_or_teamlead(sender),
            Permission::ManagerOrModel => roles.can_change_deadline(sender),
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Permission::Model => "Only models can do this",
            Permission::Manager => "Only admins and teamleads can do this",
            Permission::ManagerOrModel => "Only admins, teamleads and models can change deadlines",
        }
    }
}

/// Why a postpone is refused for the given status, if it is.
pub fn postpone_refusal(status: OrderStatus) -> Option<&'static str> {
    match status {
        s if s.allows_postpone() => None,
        OrderStatus::Draft => Some("Brief not confirmed yet. Confirm it or edit the source message."),
        _ => Some("The deadline cannot be changed in this status"),
    }
}

/// A message read as an answer to the date prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateReply {
    /// Not shaped like `DD.MM[.YYYY]`.
    NotADate,
    /// Shaped like a date but not a calendar day.
    Invalid,
    Date(NaiveDate),
}

/// Parse `DD.MM` or `DD.MM.YYYY`; the year defaults to `default_year`.
pub fn parse_date_reply(text: &str, default_year: i32) -> DateReply {
    let Some(caps) = DATE_REPLY.captures(text.trim()) else {
        return DateReply::NotADate;
    };
    let day = caps[1].parse::<u32>().ok();
    let month = caps[2].parse::<u32>().ok();
    let year = match caps.get(3) {
        Some(y) => y.as_str().parse::<i32>().ok(),
        None => Some(default_year),
    };
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(DateReply::Date)
            .unwrap_or(DateReply::Invalid),
        _ => DateReply::Invalid,
    }
}

/// New deadline for a quick shift: from the current deadline, or from today
/// when there is none.
pub fn shift_deadline(current: Option<NaiveDate>, today: NaiveDate, days: i64) -> NaiveDate {
    current.unwrap_or(today) + Duration::days(days.max(1))
}

fn shift_days(action: OrderAction) -> Option<i64> {
    match action {
        OrderAction::Postpone1d => Some(1),
        OrderAction::Postpone3d => Some(3),
        OrderAction::Postpone7d => Some(7),
        _ => None,
    }
}

fn format_deadline(deadline: Option<NaiveDate>) -> String {
    deadline
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "not set".to_string())
}

pub(crate) fn actor_of(sender: &Sender) -> Actor {
    Actor {
        id: sender.id,
        name: Some(sender.audit_name()),
    }
}

/// Handles button presses and date replies.
#[derive(Clone)]
pub struct ActionHandler {
    services: Services,
    pending: Arc<PendingState>,
}

impl ActionHandler {
    pub fn new(services: Services, pending: Arc<PendingState>) -> Self {
        Self { services, pending }
    }

    /// Handle a press and acknowledge it. Returns the toast text shown to
    /// the presser.
    pub async fn handle_callback(&self, cb: &CallbackEvent) -> String {
        let toast = match self.dispatch(cb).await {
            Ok(toast) => toast,
            Err(e) => {
                error!(data = %cb.data, chat_id = cb.chat_id, error = %e, "action failed");
                "Something went wrong, try again".to_string()
            }
        };
        if let Err(e) = self
            .services
            .notifier
            .answer_callback(&cb.callback_id, &toast)
            .await
        {
            debug!(error = %e, "callback answer failed");
        }
        toast
    }

    async fn dispatch(&self, cb: &CallbackEvent) -> Result<String, BriefError> {
        let Some((order_id, action)) = parse_callback_data(&cb.data) else {
            warn!(data = %cb.data, "unknown callback data");
            return Ok("Unknown action".to_string());
        };
        let ctx = self.services.context.load();
        let sender = Sender::from_callback(cb);

        let permission = Permission::for_action(action);
        if !permission.allows(&ctx.roles, &sender) {
            info!(order_id, action = %action, sender_id = cb.sender_id, "action denied");
            return Ok(permission.denial().to_string());
        }

        let db = self.services.db()?;
        let Some(order) = orders::get_order(db, order_id).await? else {
            return Ok(format!("Order {} not found", order_ref(order_id)));
        };
        info!(order_id, action = %action, sender_id = cb.sender_id, "action received");

        let now = Utc::now();
        match action {
            OrderAction::ConfirmBrief => {
                self.transition(&ctx, &sender, order, OrderStatus::AwaitingConfirmation, now)
                    .await
            }
            OrderAction::Take => {
                self.transition(&ctx, &sender, order, OrderStatus::Processing, now)
                    .await
            }
            OrderAction::Finish => {
                self.transition(&ctx, &sender, order, OrderStatus::Finished, now)
                    .await
            }
            OrderAction::Delivered => {
                self.transition(&ctx, &sender, order, OrderStatus::Delivered, now)
                    .await
            }
            OrderAction::NotTask => self.request_delete(cb, &sender, order).await,
            OrderAction::NotTaskConfirm => self.confirm_delete(&ctx, cb, &sender, order, now).await,
            OrderAction::NotTaskCancel => self.cancel_delete(&ctx, &sender, order, now).await,
            OrderAction::Postpone => self.open_postpone(cb, &sender, order).await,
            OrderAction::CancelPostpone => self.cancel_postpone(cb, &sender, order).await,
            OrderAction::Postpone1d | OrderAction::Postpone3d | OrderAction::Postpone7d => {
                let days = shift_days(action).unwrap_or(1);
                self.quick_shift(&ctx, cb, &sender, order, days, now).await
            }
        }
    }

    async fn feedback(&self, order: &Order, text: String) -> Option<i64> {
        let notification = OutboundNotification::text(order.chat_id, order.topic_id, text);
        send_logged(self.services.notifier.as_ref(), &notification).await
    }

    async fn transition(
        &self,
        ctx: &RuntimeContext,
        sender: &Sender,
        order: Order,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<String, BriefError> {
        let db = self.services.db()?;
        let notifier = self.services.notifier.as_ref();
        let updated =
            match orders::transition(db, order.id, to, actor_of(sender), None, now).await {
                Ok(updated) => updated,
                Err(BriefError::InvalidTransition { from, .. }) if from == to => {
                    refresh_card(notifier, ctx, &order, now).await;
                    return Ok(format!("Already {}", to.label().to_lowercase()));
                }
                Err(BriefError::InvalidTransition { from, .. }) => {
                    return Ok(format!(
                        "Not available: order is {}",
                        from.label().to_lowercase()
                    ));
                }
                Err(e) => return Err(e),
            };

        let refreshed = refresh_card(notifier, ctx, &updated, now).await;
        let who = sender.display();
        let reference = order_ref(updated.id);
        let (mut text, toast) = match to {
            OrderStatus::AwaitingConfirmation => {
                let mut text = format!(
                    "✅ {who} confirmed order {reference} ({})",
                    cards::format_amount(&updated)
                );
                let models = ctx.roles.models.mentions("model");
                if !models.is_empty() {
                    text.push_str(&format!("\nModels: {models}"));
                }
                (text, "Brief confirmed ✅")
            }
            OrderStatus::Processing => (format!("🎬 {who} took order {reference}"), "Taken 🎬"),
            OrderStatus::Finished => (
                format!("📹 {who} finished shooting order {reference}"),
                "Marked as shot 📹",
            ),
            OrderStatus::Delivered => (
                format!("📤 {who} delivered order {reference}"),
                "Delivered 📤",
            ),
            _ => (format!("{who} moved order {reference} to {to}"), "Done"),
        };
        if !refreshed {
            text.push_str("\n(card could not be updated)");
        }
        self.feedback(&updated, text).await;
        Ok(toast.to_string())
    }

    async fn request_delete(
        &self,
        cb: &CallbackEvent,
        sender: &Sender,
        order: Order,
    ) -> Result<String, BriefError> {
        if order.status != OrderStatus::Draft {
            return Ok("Only drafts can be deleted".to_string());
        }
        self.pending
            .delete_confirmations
            .insert((cb.sender_id, order.id), ());

        let buttons = cards::delete_confirm_buttons(order.id);
        let notifier = self.services.notifier.as_ref();
        let shown = match cb.message_id {
            Some(message_id) => match notifier.edit_buttons(cb.chat_id, message_id, &buttons).await {
                Ok(()) => true,
                Err(e) => {
                    error!(order_id = order.id, error = %e, "could not show delete confirmation");
                    false
                }
            },
            None => {
                let prompt = OutboundNotification::text(
                    order.chat_id,
                    order.topic_id,
                    format!(
                        "{} wants to delete order {}. Confirm?",
                        sender.display(),
                        order_ref(order.id)
                    ),
                )
                .with_buttons(buttons);
                send_logged(notifier, &prompt).await.is_some()
            }
        };
        if !shown {
            self.pending
                .delete_confirmations
                .remove(&(cb.sender_id, order.id));
            return Ok("Could not show the delete confirmation".to_string());
        }
        Ok("Press «Really delete?» within 10 seconds".to_string())
    }

    async fn confirm_delete(
        &self,
        ctx: &RuntimeContext,
        cb: &CallbackEvent,
        sender: &Sender,
        order: Order,
        now: DateTime<Utc>,
    ) -> Result<String, BriefError> {
        if order.status != OrderStatus::Draft {
            return Ok("Only drafts can be deleted".to_string());
        }
        let notifier = self.services.notifier.as_ref();
        if self
            .pending
            .delete_confirmations
            .take(&(cb.sender_id, order.id))
            .is_none()
        {
            refresh_card(notifier, ctx, &order, now).await;
            return Ok("Confirmation expired. Press «Not a brief» again.".to_string());
        }

        let db = self.services.db()?;
        match orders::delete_draft(db, order.id, now).await {
            Ok(_) => {}
            Err(BriefError::OrderNotDraft { .. }) => {
                return Ok("Only drafts can be deleted".to_string());
            }
            Err(e) => return Err(e),
        }
        info!(order_id = order.id, sender_id = cb.sender_id, "draft deleted as not a brief");

        self.feedback(
            &order,
            format!(
                "🗑 {} deleted order {} (not a brief)",
                sender.display(),
                order_ref(order.id)
            ),
        )
        .await;
        let card = order.bot_message_id.or(cb.message_id);
        if let Some(card) = card
            && let Err(e) = notifier.delete(order.chat_id, card).await
        {
            debug!(order_id = order.id, error = %e, "card delete failed");
        }
        Ok("Deleted".to_string())
    }

    async fn cancel_delete(
        &self,
        ctx: &RuntimeContext,
        sender: &Sender,
        order: Order,
        now: DateTime<Utc>,
    ) -> Result<String, BriefError> {
        let actor_id = sender.id.unwrap_or_default();
        self.pending
            .delete_confirmations
            .remove(&(actor_id, order.id));
        if !refresh_card(self.services.notifier.as_ref(), ctx, &order, now).await {
            self.feedback(
                &order,
                format!(
                    "↩️ {} cancelled deleting order {}",
                    sender.display(),
                    order_ref(order.id)
                ),
            )
            .await;
        }
        Ok("Deletion cancelled".to_string())
    }

    async fn open_postpone(
        &self,
        cb: &CallbackEvent,
        sender: &Sender,
        order: Order,
    ) -> Result<String, BriefError> {
        if let Some(refusal) = postpone_refusal(order.status) {
            return Ok(refusal.to_string());
        }
        let notifier = self.services.notifier.as_ref();
        if let Lookup::Active(previous) | Lookup::Expired(previous) =
            self.pending.postpones.lookup(&cb.sender_id)
            && let Some(prompt) = previous.prompt_message_id
        {
            clear_buttons(notifier, previous.chat_id, prompt).await;
        }

        let prompt = OutboundNotification::text(
            order.chat_id,
            order.topic_id,
            format!(
                "⏰ <b>Order {} deadline</b>\n{}, current deadline: {}\n\
                 Pick a quick shift below or reply with a date (DD.MM or DD.MM.YYYY).\n\
                 Waiting 120 seconds.",
                order_ref(order.id),
                sender.display(),
                format_deadline(order.fields.deadline),
            ),
        )
        .with_buttons(cards::postpone_buttons(order.id));
        let Some(prompt_id) = send_logged(notifier, &prompt).await else {
            return Ok("Could not open the date prompt".to_string());
        };

        self.pending.postpones.insert(
            cb.sender_id,
            PendingPostpone {
                order_id: order.id,
                chat_id: order.chat_id,
                topic_id: order.topic_id,
                prompt_message_id: Some(prompt_id),
            },
        );
        debug!(order_id = order.id, sender_id = cb.sender_id, "postpone prompt opened");
        Ok("Waiting for a date (120 s)".to_string())
    }

    /// The pending prompt for this actor and order, or `None` after clearing
    /// the pressed message's buttons.
    async fn pending_for(&self, cb: &CallbackEvent, order_id: i64) -> Option<PendingPostpone> {
        match self.pending.postpones.lookup(&cb.sender_id) {
            Lookup::Active(p) if p.order_id == order_id => Some(p),
            _ => {
                if let Some(message_id) = cb.message_id {
                    clear_buttons(self.services.notifier.as_ref(), cb.chat_id, message_id).await;
                }
                None
            }
        }
    }

    async fn close_prompt(&self, actor_id: i64, pending: &PendingPostpone) {
        self.pending.postpones.remove(&actor_id);
        if let Some(prompt) = pending.prompt_message_id {
            clear_buttons(self.services.notifier.as_ref(), pending.chat_id, prompt).await;
        }
    }

    async fn cancel_postpone(
        &self,
        cb: &CallbackEvent,
        sender: &Sender,
        order: Order,
    ) -> Result<String, BriefError> {
        let Some(pending) = self.pending_for(cb, order.id).await else {
            return Ok("No active date prompt for this order".to_string());
        };
        self.close_prompt(cb.sender_id, &pending).await;
        self.feedback(
            &order,
            format!(
                "❎ {} cancelled postponing order {}",
                sender.display(),
                order_ref(order.id)
            ),
        )
        .await;
        Ok("Postpone cancelled".to_string())
    }

    async fn quick_shift(
        &self,
        ctx: &RuntimeContext,
        cb: &CallbackEvent,
        sender: &Sender,
        order: Order,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<String, BriefError> {
        let Some(pending) = self.pending_for(cb, order.id).await else {
            return Ok("The date prompt is no longer active. Press ⏰ again.".to_string());
        };
        if let Some(refusal) = postpone_refusal(order.status) {
            self.close_prompt(cb.sender_id, &pending).await;
            return Ok(refusal.to_string());
        }

        let new_deadline = shift_deadline(order.fields.deadline, ctx.local_date(now), days);
        self.set_deadline(ctx, sender, &order, new_deadline, now)
            .await?;
        self.close_prompt(cb.sender_id, &pending).await;
        Ok(format!("Postponed by +{days} d"))
    }

    async fn set_deadline(
        &self,
        ctx: &RuntimeContext,
        sender: &Sender,
        order: &Order,
        deadline: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Order, BriefError> {
        let db = self.services.db()?;
        let updated =
            orders::update_deadline(db, order.id, Some(deadline), actor_of(sender), now).await?;
        info!(order_id = order.id, deadline = %deadline, "deadline changed");
        let refreshed = refresh_card(self.services.notifier.as_ref(), ctx, &updated, now).await;
        let mut text = format!(
            "📅 {} moved the deadline of order {}: {} → {}",
            sender.display(),
            order_ref(order.id),
            format_deadline(order.fields.deadline),
            format_deadline(Some(deadline)),
        );
        if !refreshed {
            text.push_str("\n(card could not be updated)");
        }
        self.feedback(&updated, text).await;
        Ok(updated)
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        let notification = OutboundNotification::text(msg.chat_id, msg.topic_id, text)
            .replying_to(msg.message_id);
        send_logged(self.services.notifier.as_ref(), &notification).await;
    }

    /// Treat a message as the answer to an open date prompt.
    ///
    /// Returns `true` when the message was consumed (successfully or with an
    /// error reply) and must not go through intake.
    pub async fn try_date_reply(&self, msg: &InboundMessage) -> Result<bool, BriefError> {
        let Some(actor_id) = msg.sender_id else {
            return Ok(false);
        };
        let pending = match self.pending.postpones.lookup(&actor_id) {
            Lookup::Absent => return Ok(false),
            Lookup::Expired(p) => {
                if !p.is_in(msg.chat_id, msg.topic_id) {
                    return Ok(false);
                }
                if let Some(prompt) = p.prompt_message_id {
                    clear_buttons(self.services.notifier.as_ref(), p.chat_id, prompt).await;
                }
                self.reply(msg, "The date prompt timed out. Press ⏰ again.")
                    .await;
                return Ok(true);
            }
            Lookup::Active(p) => p,
        };
        if !pending.is_in(msg.chat_id, msg.topic_id) {
            return Ok(false);
        }
        let Some(text) = msg.trimmed_text() else {
            return Ok(false);
        };

        let ctx = self.services.context.load();
        let now = Utc::now();
        let today = ctx.local_date(now);
        let date = match parse_date_reply(text, today.year()) {
            DateReply::NotADate => return Ok(false),
            DateReply::Date(date) => date,
            DateReply::Invalid => {
                self.reply(msg, &format!("Invalid date: {}", cards::escape_html(text)))
                    .await;
                return Ok(true);
            }
        };

        let sender = Sender::from_message(msg);
        if !ctx.roles.can_change_deadline(&sender) {
            self.close_prompt(actor_id, &pending).await;
            self.reply(msg, Permission::ManagerOrModel.denial()).await;
            return Ok(true);
        }

        let db = self.services.db()?;
        let Some(order) = orders::get_order(db, pending.order_id).await? else {
            self.close_prompt(actor_id, &pending).await;
            self.reply(msg, "Order not found").await;
            return Ok(true);
        };
        if let Some(refusal) = postpone_refusal(order.status) {
            self.close_prompt(actor_id, &pending).await;
            self.reply(msg, refusal).await;
            return Ok(true);
        }

        self.set_deadline(&ctx, &sender, &order, date, now).await?;
        self.close_prompt(actor_id, &pending).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_reply_parsing() {
        assert_eq!(parse_date_reply("12.03", 2026), DateReply::Date(date(2026, 3, 12)));
        assert_eq!(
            parse_date_reply(" 1.2.2027 ", 2026),
            DateReply::Date(date(2027, 2, 1))
        );
        assert_eq!(parse_date_reply("31.02", 2026), DateReply::Invalid);
        assert_eq!(parse_date_reply("tomorrow", 2026), DateReply::NotADate);
        assert_eq!(parse_date_reply("12.03 please", 2026), DateReply::NotADate);
    }

    #[test]
    fn shift_from_deadline_or_today() {
        let today = date(2026, 3, 10);
        assert_eq!(shift_deadline(None, today, 3), date(2026, 3, 13));
        assert_eq!(shift_deadline(Some(date(2026, 3, 1)), today, 7), date(2026, 3, 8));
        assert_eq!(shift_deadline(None, today, 0), date(2026, 3, 11));
    }

    #[test]
    fn permissions_by_action() {
        assert_eq!(Permission::for_action(OrderAction::Take), Permission::Model);
        assert_eq!(Permission::for_action(OrderAction::Delivered), Permission::Manager);
        assert_eq!(
            Permission::for_action(OrderAction::Postpone3d),
            Permission::ManagerOrModel
        );

        let roles = RoleDirectory::from_config(&brieftrack_config::model::RolesConfig {
            model_ids: vec![3],
            teamlead_usernames: vec!["lead".into()],
            ..Default::default()
        });
        let model = Sender {
            id: Some(3),
            ..Default::default()
        };
        let lead = Sender {
            id: Some(9),
            username: Some("Lead".into()),
            name: None,
        };
        assert!(Permission::Model.allows(&roles, &model));
        assert!(!Permission::Model.allows(&roles, &lead));
        assert!(Permission::Manager.allows(&roles, &lead));
        assert!(Permission::ManagerOrModel.allows(&roles, &model));
        assert!(Permission::ManagerOrModel.allows(&roles, &lead));
    }

    #[test]
    fn postpone_allowed_only_while_pending_or_underway() {
        assert!(postpone_refusal(OrderStatus::AwaitingConfirmation).is_none());
        assert!(postpone_refusal(OrderStatus::Processing).is_none());
        assert!(postpone_refusal(OrderStatus::Draft).is_some());
        assert!(postpone_refusal(OrderStatus::Finished).is_some());
    }
}
