// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTML rendering of order cards and their inline keyboards.

use brieftrack_core::{ActionButton, OrderAction, OrderStatus};
use brieftrack_storage::Order;
use chrono::NaiveDate;

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// `#007`
pub fn order_ref(id: i64) -> String {
    format!("#{id:03}")
}

/// `$80`, `$80 (half paid)`, or `—` when the total is unknown.
pub fn format_amount(order: &Order) -> String {
    let Some(total) = order.fields.amount_total else {
        return "—".to_string();
    };
    match order.fields.payment_note.as_deref().map(str::trim) {
        Some(note) if !note.is_empty() => format!("${total:.0} ({})", escape_html(note)),
        _ => format!("${total:.0}"),
    }
}

/// Human deadline status relative to `today`.
pub fn deadline_status(deadline: Option<NaiveDate>, today: NaiveDate) -> String {
    let Some(deadline) = deadline else {
        return "no deadline".to_string();
    };
    let days_left = (deadline - today).num_days();
    match days_left {
        d if d < 0 => format!("🔴 overdue by {} d", -d),
        0 => "🔴 today!".to_string(),
        1..=3 => format!("⚠️ in {days_left} d"),
        _ => format!("⏰ until {}", deadline.format("%d.%m")),
    }
}

/// `+N d` past the deadline, for overdue listings.
pub fn days_overdue(deadline: NaiveDate, today: NaiveDate) -> String {
    format!("+{} d", (today - deadline).num_days().max(0))
}

fn preview(text: &str) -> String {
    let mut chars = text.trim().chars();
    let head: String = chars.by_ref().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Full card text for the order's current status.
pub fn render_card(order: &Order, today: NaiveDate) -> String {
    let mut lines = vec![format!(
        "{} <b>Order {}</b> | {} | {} | {}",
        order.status.icon(),
        order_ref(order.id),
        format_amount(order),
        deadline_status(order.fields.deadline, today),
        order.status.label(),
    )];

    let fields = &order.fields;
    let description = fields
        .description
        .as_deref()
        .or(order.originals.description.as_deref());
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        lines.push(escape_html(&preview(description)));
    }
    if let Some(duration) = fields.duration.as_deref() {
        lines.push(format!("⏱ {}", escape_html(duration)));
    }

    let fan = fields
        .fan_name
        .as_deref()
        .or(fields.fan_link.as_deref())
        .map(escape_html);
    let platform = fields.platform.map(|p| p.label());
    match (fan, platform) {
        (Some(fan), Some(platform)) => lines.push(format!("👤 {fan} | 🌐 {platform}")),
        (Some(fan), None) => lines.push(format!("👤 {fan}")),
        (None, Some(platform)) => lines.push(format!("🌐 {platform}")),
        (None, None) => {}
    }
    lines.push(format!("{} {}", fields.priority.icon(), fields.priority));

    lines.join("\n")
}

/// Buttons offered for the order's status, one per row.
pub fn card_buttons(order: &Order) -> Vec<Vec<ActionButton>> {
    let id = order.id;
    let row = |action: OrderAction, label: &str| vec![ActionButton::new(id, action, label)];
    match order.status {
        OrderStatus::Draft => vec![
            row(OrderAction::ConfirmBrief, "✅ Confirm brief"),
            row(OrderAction::NotTask, "❌ Not a brief"),
        ],
        OrderStatus::AwaitingConfirmation => vec![
            row(OrderAction::Take, "🎬 Take"),
            row(OrderAction::Postpone, "⏰ Postpone"),
        ],
        OrderStatus::Processing => vec![
            row(OrderAction::Finish, "📹 Shot"),
            row(OrderAction::Postpone, "⏰ Postpone"),
        ],
        OrderStatus::Finished => vec![row(OrderAction::Delivered, "📤 Delivered")],
        OrderStatus::Delivered | OrderStatus::Cancelled => Vec::new(),
    }
}

/// Second step of the "not a brief" deletion.
pub fn delete_confirm_buttons(order_id: i64) -> Vec<Vec<ActionButton>> {
    vec![
        vec![ActionButton::new(
            order_id,
            OrderAction::NotTaskConfirm,
            "⚠️ Really delete?",
        )],
        vec![ActionButton::new(order_id, OrderAction::NotTaskCancel, "↩️ Cancel")],
    ]
}

/// Quick shifts plus cancel, shown under the date prompt.
pub fn postpone_buttons(order_id: i64) -> Vec<Vec<ActionButton>> {
    vec![
        vec![
            ActionButton::new(order_id, OrderAction::Postpone1d, "+1 d"),
            ActionButton::new(order_id, OrderAction::Postpone3d, "+3 d"),
            ActionButton::new(order_id, OrderAction::Postpone7d, "+7 d"),
        ],
        vec![ActionButton::new(
            order_id,
            OrderAction::CancelPostpone,
            "❎ Cancel",
        )],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use brieftrack_core::{BriefFields, LifecycleStamps, Platform, Priority};
    use brieftrack_storage::OriginalSections;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            chat_id: -100,
            message_id: 10,
            topic_id: Some(3),
            bot_message_id: None,
            sender_username: None,
            fields: BriefFields::default(),
            originals: OriginalSections::default(),
            status,
            stamps: LifecycleStamps::default(),
            raw_text: None,
            ai_confidence: None,
            last_reminder_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deadline_statuses() {
        let today = date(2026, 3, 10);
        assert_eq!(deadline_status(None, today), "no deadline");
        assert_eq!(deadline_status(Some(date(2026, 3, 8)), today), "🔴 overdue by 2 d");
        assert_eq!(deadline_status(Some(today), today), "🔴 today!");
        assert_eq!(deadline_status(Some(date(2026, 3, 13)), today), "⚠️ in 3 d");
        assert_eq!(deadline_status(Some(date(2026, 3, 20)), today), "⏰ until 20.03");
        assert_eq!(days_overdue(date(2026, 3, 7), today), "+3 d");
    }

    #[test]
    fn amount_formatting() {
        let mut o = order(1, OrderStatus::Draft);
        assert_eq!(format_amount(&o), "—");
        o.fields.amount_total = Some(80.0);
        assert_eq!(format_amount(&o), "$80");
        o.fields.payment_note = Some("half <paid>".into());
        assert_eq!(format_amount(&o), "$80 (half &lt;paid&gt;)");
    }

    #[test]
    fn card_contains_header_and_fields() {
        let mut o = order(7, OrderStatus::AwaitingConfirmation);
        o.fields = BriefFields {
            amount_total: Some(120.0),
            deadline: Some(date(2026, 3, 11)),
            platform: Some(Platform::Onlyfans),
            priority: Priority::High,
            fan_name: Some("Tom".into()),
            duration: Some("5 min".into()),
            description: Some("x".repeat(150)),
            ..Default::default()
        };
        let card = render_card(&o, date(2026, 3, 10));
        let lines: Vec<&str> = card.lines().collect();
        assert_eq!(
            lines[0],
            "📦 <b>Order #007</b> | $120 | ⚠️ in 1 d | AWAITING MODEL"
        );
        assert_eq!(lines[1].chars().count(), 101);
        assert!(lines[1].ends_with('…'));
        assert_eq!(lines[2], "⏱ 5 min");
        assert_eq!(lines[3], "👤 Tom | 🌐 OnlyFans");
        assert_eq!(lines[4], "🔴 high");
    }

    #[test]
    fn buttons_follow_status() {
        let actions = |status| -> Vec<OrderAction> {
            card_buttons(&order(1, status))
                .into_iter()
                .flatten()
                .map(|b| b.action)
                .collect()
        };
        assert_eq!(
            actions(OrderStatus::Draft),
            vec![OrderAction::ConfirmBrief, OrderAction::NotTask]
        );
        assert_eq!(
            actions(OrderStatus::AwaitingConfirmation),
            vec![OrderAction::Take, OrderAction::Postpone]
        );
        assert_eq!(
            actions(OrderStatus::Processing),
            vec![OrderAction::Finish, OrderAction::Postpone]
        );
        assert_eq!(actions(OrderStatus::Finished), vec![OrderAction::Delivered]);
        assert!(actions(OrderStatus::Delivered).is_empty());
        assert!(actions(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn postpone_keyboard_data() {
        let rows = postpone_buttons(5);
        assert_eq!(rows[0][1].callback_data(), "order:5:postpone_3d");
        assert_eq!(rows[1][0].callback_data(), "order:5:cancel_postpone");
    }
}
