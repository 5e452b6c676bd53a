// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Morning digest: one summary of open work per local day.

use brieftrack_core::{BriefError, OrderStatus, OutboundNotification};
use brieftrack_intake::cards::{days_overdue, format_amount, order_ref};
use brieftrack_intake::outbound::send_logged;
use brieftrack_intake::{RuntimeContext, Services};
use brieftrack_storage::Order;
use brieftrack_storage::queries::orders;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::reminders::{finished_cutoff, short_description};

/// Lines listed per section before the remainder is summarised.
pub const SECTION_LIMIT: usize = 10;

const COUNTED_STATUSES: [OrderStatus; 4] = [
    OrderStatus::Draft,
    OrderStatus::AwaitingConfirmation,
    OrderStatus::Processing,
    OrderStatus::Finished,
];

/// Everything the digest text is rendered from.
#[derive(Debug, Clone, Default)]
pub struct DigestData {
    pub active: Vec<Order>,
    pub status_counts: Vec<(OrderStatus, i64)>,
    pub overdue: Vec<Order>,
    pub due_today: Vec<Order>,
    pub awaiting_delivery: Vec<Order>,
}

impl DigestData {
    pub async fn collect(
        services: &Services,
        ctx: &RuntimeContext,
        now: DateTime<Utc>,
    ) -> Result<Self, BriefError> {
        let db = services.db()?;
        let today = ctx.local_date(now);
        Ok(Self {
            active: orders::active_orders(db).await?,
            status_counts: orders::status_counts(db).await?,
            overdue: orders::overdue_orders(db, today).await?,
            due_today: orders::orders_due_within(db, today, 0).await?,
            awaiting_delivery: match finished_cutoff(&ctx.config.reminders, now) {
                Some(cutoff) => orders::finished_before(db, cutoff).await?,
                None => Vec::new(),
            },
        })
    }

    fn count(&self, status: OrderStatus) -> i64 {
        self.status_counts
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }
}

fn push_section(
    lines: &mut Vec<String>,
    title: String,
    orders: &[Order],
    line: impl Fn(&Order) -> String,
) {
    if orders.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(title);
    lines.extend(orders.iter().take(SECTION_LIMIT).map(line));
    if orders.len() > SECTION_LIMIT {
        lines.push(format!("  … and {} more", orders.len() - SECTION_LIMIT));
    }
}

/// Render the digest, or `None` when there is no open work.
pub fn render(data: &DigestData, today: NaiveDate) -> Option<String> {
    if data.active.is_empty() {
        return None;
    }

    let total: f64 = data
        .active
        .iter()
        .filter_map(|o| o.fields.amount_total)
        .sum();
    let statuses = COUNTED_STATUSES
        .iter()
        .map(|s| format!("{} <b>{}</b>", s.label().to_lowercase(), data.count(*s)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        "🌅 <b>Morning digest</b>".to_string(),
        format!(
            "Active: <b>{}</b> | Overdue: <b>{}</b> | Due today: <b>{}</b>",
            data.active.len(),
            data.overdue.len(),
            data.due_today.len()
        ),
        format!("Statuses: {statuses}"),
        format!("Active total: <b>${total:.0}</b>"),
    ];

    push_section(
        &mut lines,
        format!("🚨 <b>Overdue ({}):</b>", data.overdue.len()),
        &data.overdue,
        |o| {
            let overdue = o
                .fields
                .deadline
                .map(|d| days_overdue(d, today))
                .unwrap_or_default();
            format!(
                "  {} | {} | {} | {overdue}",
                order_ref(o.id),
                format_amount(o),
                short_description(o)
            )
        },
    );
    push_section(
        &mut lines,
        format!("⏰ <b>Due today ({}):</b>", data.due_today.len()),
        &data.due_today,
        |o| {
            format!(
                "  {} | {} | {}",
                order_ref(o.id),
                format_amount(o),
                short_description(o)
            )
        },
    );
    push_section(
        &mut lines,
        format!(
            "⏳ <b>Shot but not delivered ({}):</b>",
            data.awaiting_delivery.len()
        ),
        &data.awaiting_delivery,
        |o| format!("  {} | {}", order_ref(o.id), short_description(o)),
    );

    Some(lines.join("\n"))
}

/// Collect, render, and post the digest. Returns whether one was sent.
pub async fn send_digest(
    services: &Services,
    ctx: &RuntimeContext,
    now: DateTime<Utc>,
) -> Result<bool, BriefError> {
    let Some(chat_id) = ctx.working_chat() else {
        debug!("no working chat configured, digest skipped");
        return Ok(false);
    };
    let data = DigestData::collect(services, ctx, now).await?;
    let Some(text) = render(&data, ctx.local_date(now)) else {
        debug!("no active orders, digest skipped");
        return Ok(false);
    };

    let notification = OutboundNotification::text(chat_id, ctx.working_topic(), text);
    let sent = send_logged(services.notifier.as_ref(), &notification)
        .await
        .is_some();
    if sent {
        info!(active = data.active.len(), overdue = data.overdue.len(), "morning digest sent");
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brieftrack_core::{BriefFields, LifecycleStamps};
    use brieftrack_storage::OriginalSections;
    use chrono::TimeZone;

    fn order(id: i64, status: OrderStatus, amount: Option<f64>) -> Order {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
        Order {
            id,
            chat_id: -100,
            message_id: id,
            topic_id: None,
            bot_message_id: None,
            sender_username: None,
            fields: BriefFields {
                amount_total: amount,
                deadline: NaiveDate::from_ymd_opt(2026, 2, 28),
                ..Default::default()
            },
            originals: OriginalSections::default(),
            status,
            stamps: LifecycleStamps::default(),
            raw_text: None,
            ai_confidence: None,
            last_reminder_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn nothing_active_renders_nothing() {
        assert_eq!(render(&DigestData::default(), today()), None);
    }

    #[test]
    fn header_counts_and_total() {
        let active = vec![
            order(1, OrderStatus::Draft, Some(50.0)),
            order(2, OrderStatus::Processing, Some(30.0)),
            order(3, OrderStatus::Processing, None),
        ];
        let data = DigestData {
            overdue: vec![active[1].clone()],
            active,
            status_counts: vec![
                (OrderStatus::Draft, 1),
                (OrderStatus::Processing, 2),
                (OrderStatus::Delivered, 9),
            ],
            ..Default::default()
        };
        let text = render(&data, today()).unwrap();

        assert!(text.contains("Active: <b>3</b> | Overdue: <b>1</b> | Due today: <b>0</b>"));
        assert!(text.contains(
            "Statuses: draft <b>1</b>, awaiting model <b>0</b>, in progress <b>2</b>, shot <b>0</b>"
        ));
        assert!(text.contains("Active total: <b>$80</b>"));
        assert!(text.contains("🚨 <b>Overdue (1):</b>\n  #002 | $30 | — | +1 d"));
        assert!(!text.contains("Due today ("));
        assert!(!text.contains("delivered <b>"));
    }

    #[test]
    fn long_sections_are_capped() {
        let overdue: Vec<Order> = (1..=13)
            .map(|id| order(id, OrderStatus::Processing, None))
            .collect();
        let data = DigestData {
            active: overdue.clone(),
            overdue,
            ..Default::default()
        };
        let text = render(&data, today()).unwrap();

        assert!(text.contains("#010"));
        assert!(!text.contains("#011"));
        assert!(text.contains("  … and 3 more"));
    }
}
