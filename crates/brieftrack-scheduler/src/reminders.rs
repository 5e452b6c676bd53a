// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Overdue, due-soon, and delivery reminders.
//!
//! Each job selects candidate orders, drops those still inside their
//! cooldown, and posts one summary message to the working topic. The
//! reminder stamp is written only after the send succeeded, so a failed
//! send is retried on the next run.

use brieftrack_config::model::ReminderConfig;
use brieftrack_core::{BriefError, OutboundNotification, Priority};
use brieftrack_intake::cards::{days_overdue, escape_html, format_amount, order_ref};
use brieftrack_intake::outbound::send_logged;
use brieftrack_intake::{RuntimeContext, Services};
use brieftrack_storage::Order;
use brieftrack_storage::queries::orders;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};

/// Description length in listing lines.
pub const LINE_DESCRIPTION_CHARS: usize = 40;

/// Cooldown between reminders for one order.
pub fn cooldown(order: &Order, config: &ReminderConfig) -> Duration {
    let hours = if order.fields.priority == Priority::High {
        config.high_urgency_cooldown_hours
    } else {
        config.overdue_cooldown_hours
    };
    whole_hours(hours)
}

/// Non-negative hours as a duration, saturating at `Duration::MAX`.
pub fn whole_hours(hours: i64) -> Duration {
    Duration::try_hours(hours.max(0)).unwrap_or(Duration::MAX)
}

/// An order is due for a reminder when it never had one or the last one is
/// strictly older than the cooldown.
pub fn should_remind(last: Option<DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => now - last > cooldown,
    }
}

/// Look-ahead in whole days for the due-soon scan: `ceil(hours / 24)`, at
/// least one.
pub fn due_soon_days(reminder_hours_before: i64) -> u32 {
    let hours = u64::try_from(reminder_hours_before).unwrap_or(0);
    u32::try_from(hours.div_ceil(24).max(1)).unwrap_or(u32::MAX)
}

/// Hours an order may stay shot before a delivery reminder, at least one.
pub fn finished_hours(config: &ReminderConfig) -> i64 {
    config.finished_reminder_hours.max(1)
}

/// Orders shot at or before this instant are awaiting delivery. `None` when
/// the window reaches past the start of time, so no order qualifies.
pub fn finished_cutoff(config: &ReminderConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(whole_hours(finished_hours(config)))
}

/// Escaped description (or the extracted original) cut for a listing line.
pub fn short_description(order: &Order) -> String {
    let text = order
        .fields
        .description
        .as_deref()
        .or(order.originals.description.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("—");
    escape_html(&text.chars().take(LINE_DESCRIPTION_CHARS).collect::<String>())
}

pub fn overdue_text(orders: &[Order], today: NaiveDate) -> String {
    let mut lines = vec![format!("🚨 <b>Overdue orders: {}</b>\n", orders.len())];
    for order in orders {
        let overdue = order
            .fields
            .deadline
            .map(|d| days_overdue(d, today))
            .unwrap_or_default();
        lines.push(format!(
            "  {} | {} | {} | {overdue}",
            order_ref(order.id),
            format_amount(order),
            short_description(order),
        ));
    }
    lines.join("\n")
}

pub fn due_soon_text(orders: &[Order]) -> String {
    let mut lines = vec![format!("⏰ <b>Deadline today/tomorrow: {}</b>\n", orders.len())];
    for order in orders {
        let deadline = order
            .fields
            .deadline
            .map(|d| d.format("%d.%m.%Y").to_string())
            .unwrap_or_default();
        lines.push(format!(
            "  {} | {} | {} | deadline: {deadline}",
            order_ref(order.id),
            format_amount(order),
            short_description(order),
        ));
    }
    lines.join("\n")
}

pub fn delivery_text(orders: &[Order], hours: i64) -> String {
    let mut lines = vec![format!("⏳ <b>Shot but not delivered: {}</b>\n", orders.len())];
    for order in orders {
        lines.push(format!(
            "  ⏳ Order {} was shot more than {hours} h ago but is not delivered",
            order_ref(order.id)
        ));
    }
    lines.join("\n")
}

/// Post `text` to the working topic and stamp the listed orders. Returns the
/// number of orders reminded.
async fn remind(
    services: &Services,
    ctx: &RuntimeContext,
    job: &'static str,
    due: Vec<Order>,
    text: String,
    now: DateTime<Utc>,
) -> Result<usize, BriefError> {
    if due.is_empty() {
        return Ok(0);
    }
    let Some(chat_id) = ctx.working_chat() else {
        debug!(job, "no working chat configured, reminder skipped");
        return Ok(0);
    };
    let notification = OutboundNotification::text(chat_id, ctx.working_topic(), text);
    if send_logged(services.notifier.as_ref(), &notification)
        .await
        .is_none()
    {
        return Ok(0);
    }

    let ids: Vec<i64> = due.iter().map(|o| o.id).collect();
    let count = ids.len();
    orders::mark_reminded(services.db()?, ids, now).await?;
    info!(job, orders = count, "reminder sent");
    Ok(count)
}

/// Open orders whose deadline passed before the local today.
pub async fn remind_overdue(
    services: &Services,
    ctx: &RuntimeContext,
    now: DateTime<Utc>,
) -> Result<usize, BriefError> {
    let config = &ctx.config.reminders;
    let today = ctx.local_date(now);
    let due: Vec<Order> = orders::overdue_orders(services.db()?, today)
        .await?
        .into_iter()
        .filter(|o| should_remind(o.last_reminder_at, cooldown(o, config), now))
        .collect();
    let text = overdue_text(&due, today);
    remind(services, ctx, "overdue", due, text, now).await
}

/// Open orders whose deadline falls within the look-ahead window.
pub async fn remind_due_soon(
    services: &Services,
    ctx: &RuntimeContext,
    now: DateTime<Utc>,
) -> Result<usize, BriefError> {
    let config = &ctx.config.reminders;
    let today = ctx.local_date(now);
    let days = due_soon_days(config.reminder_hours_before);
    let due: Vec<Order> = orders::orders_due_within(services.db()?, today, days)
        .await?
        .into_iter()
        .filter(|o| should_remind(o.last_reminder_at, cooldown(o, config), now))
        .collect();
    let text = due_soon_text(&due);
    remind(services, ctx, "due_soon", due, text, now).await
}

/// Orders shot long ago but still not delivered. Uses the normal cooldown
/// regardless of priority.
pub async fn remind_delivery(
    services: &Services,
    ctx: &RuntimeContext,
    now: DateTime<Utc>,
) -> Result<usize, BriefError> {
    let config = &ctx.config.reminders;
    let hours = finished_hours(config);
    let Some(cutoff) = finished_cutoff(config, now) else {
        debug!(hours, "delivery window exceeds the calendar, nothing to remind");
        return Ok(0);
    };
    let cooldown = whole_hours(config.overdue_cooldown_hours);
    let due: Vec<Order> = orders::finished_before(services.db()?, cutoff)
        .await?
        .into_iter()
        .filter(|o| should_remind(o.last_reminder_at, cooldown, now))
        .collect();
    let text = delivery_text(&due, hours);
    remind(services, ctx, "delivery", due, text, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use brieftrack_core::{BriefFields, LifecycleStamps, OrderStatus};
    use brieftrack_storage::OriginalSections;
    use chrono::TimeZone;

    fn order(id: i64, priority: Priority) -> Order {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Order {
            id,
            chat_id: -100,
            message_id: id,
            topic_id: None,
            bot_message_id: None,
            sender_username: None,
            fields: BriefFields {
                priority,
                amount_total: Some(80.0),
                deadline: NaiveDate::from_ymd_opt(2026, 2, 27),
                ..Default::default()
            },
            originals: OriginalSections::default(),
            status: OrderStatus::Processing,
            stamps: LifecycleStamps::default(),
            raw_text: None,
            ai_confidence: None,
            last_reminder_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn high_priority_uses_short_cooldown() {
        let config = ReminderConfig::default();
        assert_eq!(cooldown(&order(1, Priority::High), &config), Duration::hours(2));
        assert_eq!(cooldown(&order(1, Priority::Medium), &config), Duration::hours(4));
        assert_eq!(cooldown(&order(1, Priority::Low), &config), Duration::hours(4));

        let config = ReminderConfig {
            overdue_cooldown_hours: 10_000_000_000_000_000,
            high_urgency_cooldown_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(cooldown(&order(1, Priority::Medium), &config), Duration::MAX);
        assert_eq!(cooldown(&order(1, Priority::High), &config), Duration::MAX);
        assert_eq!(whole_hours(-3), Duration::zero());
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let four = Duration::hours(4);
        assert!(should_remind(None, four, now));
        assert!(!should_remind(Some(now - four), four, now));
        assert!(should_remind(Some(now - four - Duration::seconds(1)), four, now));
    }

    #[test]
    fn due_soon_window_rounds_up_to_days() {
        assert_eq!(due_soon_days(24), 1);
        assert_eq!(due_soon_days(25), 2);
        assert_eq!(due_soon_days(48), 2);
        assert_eq!(due_soon_days(0), 1);
        assert_eq!(due_soon_days(-5), 1);
    }

    #[test]
    fn overdue_listing() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut o = order(7, Priority::Medium);
        o.fields.description = Some("custom <video> for a very loyal fan with a long request".into());
        let text = overdue_text(&[o], today);

        assert!(text.starts_with("🚨 <b>Overdue orders: 1</b>"));
        assert!(text.contains("#007 | $80 | custom &lt;video&gt;"));
        assert!(text.ends_with("| +2 d"));
    }

    #[test]
    fn missing_description_falls_back() {
        let o = order(3, Priority::Low);
        assert_eq!(short_description(&o), "—");
        let mut o = o;
        o.originals.description = Some("from the brief".into());
        assert_eq!(short_description(&o), "from the brief");
    }

    #[test]
    fn delivery_listing_names_hours() {
        let text = delivery_text(&[order(12, Priority::Medium)], 24);
        assert!(text.contains("Order #012 was shot more than 24 h ago"));
    }
}
