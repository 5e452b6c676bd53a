// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the persisted entities, plus column conversions.
//!
//! Timestamps are stored as fixed-width UTC RFC 3339 text
//! (`2026-01-01T00:00:00.000Z`) so lexical order equals time order and the
//! due scans can compare strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use brieftrack_core::{BriefFields, LifecycleStamps, LogKind, OrderStatus};

/// Who performed a change. Both parts are absent for system-driven changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
        }
    }

    /// The service itself (order detection, retry processing).
    pub fn bot() -> Self {
        Self {
            id: None,
            name: Some("bot".to_string()),
        }
    }

    pub fn system() -> Self {
        Self::default()
    }
}

/// Labelled sections copied verbatim from the source brief.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalSections {
    pub description: Option<String>,
    pub outfit: Option<String>,
    pub notes: Option<String>,
}

/// A tracked work order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub topic_id: Option<i64>,
    /// Id of the card message the bot posted for this order.
    pub bot_message_id: Option<i64>,
    pub sender_username: Option<String>,
    pub fields: BriefFields,
    pub originals: OriginalSections,
    pub status: OrderStatus,
    pub stamps: LifecycleStamps,
    pub raw_text: Option<String>,
    pub ai_confidence: Option<f64>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::queries::orders::create_order`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub chat_id: i64,
    pub message_id: i64,
    pub topic_id: Option<i64>,
    pub sender_username: Option<String>,
    pub fields: BriefFields,
    pub originals: OriginalSections,
    /// Starting status. Intake, including `/add`, always creates drafts.
    pub status: OrderStatus,
    pub raw_text: Option<String>,
    /// Set for classifier-detected orders, absent for manual ones.
    pub ai_confidence: Option<f64>,
    pub actor: Actor,
}

/// Result of an idempotent create.
#[derive(Debug, Clone)]
pub struct OrderCreation {
    pub order: Order,
    /// `false` when a row for the same (chat, message) already existed.
    pub created: bool,
}

/// One audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLogEntry {
    pub id: i64,
    pub order_id: i64,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub kind: LogKind,
    pub actor: Actor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message waiting for another classification attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEntry {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub topic_id: Option<i64>,
    pub raw_text: String,
    pub has_photo: bool,
    pub sender_username: Option<String>,
    pub attempt_count: u32,
    pub first_enqueued_at: DateTime<Utc>,
    pub next_retry_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Input for [`crate::queries::retry_queue::enqueue`].
#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub topic_id: Option<i64>,
    pub raw_text: String,
    pub has_photo: bool,
    pub sender_username: Option<String>,
    pub last_error: Option<String>,
}

/// A permanent classification failure kept for operators.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub raw_text: Option<String>,
    pub error_type: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a parse failure.
#[derive(Debug, Clone)]
pub struct NewParseFailure {
    pub chat_id: i64,
    pub message_id: i64,
    pub raw_text: Option<String>,
    pub error_type: String,
    pub detail: Option<String>,
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| conversion_error(idx, e)),
    }
}

pub(crate) fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
    }
}

pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = strum::ParseError>,
{
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| conversion_error(idx, e)),
    }
}

/// Column list matching [`order_from_row`].
pub(crate) const ORDER_COLUMNS: &str = "id, chat_id, message_id, topic_id, bot_message_id, \
     sender_username, task_date, fan_link, fan_name, platform, amount_total, amount_paid, \
     amount_remaining, payment_note, duration, description, outfit, notes, \
     description_original, outfit_original, notes_original, priority, deadline, status, \
     finished_at, delivered_at, raw_text, ai_confidence, last_reminder_at, created_at, \
     updated_at";

pub(crate) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        message_id: row.get(2)?,
        topic_id: row.get(3)?,
        bot_message_id: row.get(4)?,
        sender_username: row.get(5)?,
        fields: BriefFields {
            task_date: opt_date_col(row, 6)?,
            fan_link: row.get(7)?,
            fan_name: row.get(8)?,
            platform: opt_enum_col(row, 9)?,
            amount_total: row.get(10)?,
            amount_paid: row.get(11)?,
            amount_remaining: row.get(12)?,
            payment_note: row.get(13)?,
            duration: row.get(14)?,
            description: row.get(15)?,
            outfit: row.get(16)?,
            notes: row.get(17)?,
            priority: enum_col(row, 21)?,
            deadline: opt_date_col(row, 22)?,
        },
        originals: OriginalSections {
            description: row.get(18)?,
            outfit: row.get(19)?,
            notes: row.get(20)?,
        },
        status: enum_col(row, 23)?,
        stamps: LifecycleStamps {
            finished_at: opt_ts_col(row, 24)?,
            delivered_at: opt_ts_col(row, 25)?,
        },
        raw_text: row.get(26)?,
        ai_confidence: row.get(27)?,
        last_reminder_at: opt_ts_col(row, 28)?,
        created_at: ts_col(row, 29)?,
        updated_at: ts_col(row, 30)?,
    })
}

pub(crate) const RETRY_COLUMNS: &str = "id, chat_id, message_id, topic_id, raw_text, has_photo, \
     sender_username, attempt_count, first_enqueued_at, next_retry_at, last_error";

pub(crate) fn retry_from_row(row: &Row<'_>) -> rusqlite::Result<RetryEntry> {
    Ok(RetryEntry {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        message_id: row.get(2)?,
        topic_id: row.get(3)?,
        raw_text: row.get(4)?,
        has_photo: row.get(5)?,
        sender_username: row.get(6)?,
        attempt_count: row.get(7)?,
        first_enqueued_at: ts_col(row, 8)?,
        next_retry_at: ts_col(row, 9)?,
        last_error: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert_eq!(format_ts(a), "2026-01-02T03:04:05.000Z");
        assert_eq!(format_ts(b), "2026-01-02T03:04:06.500Z");
        assert!(format_ts(a) < format_ts(b));
    }

    #[test]
    fn actor_constructors() {
        assert_eq!(Actor::bot().name.as_deref(), Some("bot"));
        assert_eq!(Actor::system(), Actor::default());
        assert_eq!(Actor::new(5, "lead").id, Some(5));
    }
}
