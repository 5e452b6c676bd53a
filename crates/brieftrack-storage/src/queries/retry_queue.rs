// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable queue of messages whose classification failed transiently.
//!
//! One row per (chat, message). Rows are only removed once the message has
//! a final outcome, so a crash mid-batch simply leaves them due for the next
//! scan.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use brieftrack_core::BriefError;

use crate::database::{Database, map_tr_err};
use crate::models::{
    NewParseFailure, RETRY_COLUMNS, RetryEntry, RetryRequest, format_ts, retry_from_row,
};
use crate::queries::orders::load_order_by_message;
use crate::queries::processed::{insert_failure, upsert_marker};

/// Outcome of checking a due entry against already-recorded results.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleCheck {
    /// Still needs classification.
    Fresh(RetryEntry),
    /// Entry vanished (handled by a concurrent run).
    Missing,
    /// The message already had a final outcome; the entry was dropped.
    AlreadyProcessed,
    /// An order already exists for the message; the entry was dropped and
    /// the message marked processed.
    OrderExists(i64),
}

fn load_entry(conn: &Connection, id: i64) -> rusqlite::Result<Option<RetryEntry>> {
    conn.query_row(
        &format!("SELECT {RETRY_COLUMNS} FROM retry_queue WHERE id = ?1"),
        params![id],
        retry_from_row,
    )
    .optional()
}

/// Insert or refresh the entry for a message.
///
/// A refresh replaces text, topic, sender, and error and makes the entry due
/// immediately, but keeps `first_enqueued_at` and `attempt_count`.
pub async fn enqueue(
    db: &Database,
    request: RetryRequest,
    now: DateTime<Utc>,
) -> Result<RetryEntry, BriefError> {
    db.connection()
        .call(move |conn| -> Result<RetryEntry, rusqlite::Error> {
            let now_s = format_ts(now);
            conn.execute(
                "INSERT INTO retry_queue
                    (chat_id, message_id, topic_id, raw_text, has_photo, sender_username,
                     attempt_count, first_enqueued_at, next_retry_at, last_error, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7, ?8, ?7)
                 ON CONFLICT (chat_id, message_id) DO UPDATE SET
                    topic_id = excluded.topic_id,
                    raw_text = excluded.raw_text,
                    has_photo = excluded.has_photo,
                    sender_username = excluded.sender_username,
                    last_error = excluded.last_error,
                    next_retry_at = excluded.next_retry_at,
                    updated_at = excluded.updated_at",
                params![
                    request.chat_id,
                    request.message_id,
                    request.topic_id,
                    request.raw_text,
                    request.has_photo,
                    request.sender_username,
                    now_s,
                    request.last_error,
                ],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {RETRY_COLUMNS} FROM retry_queue WHERE chat_id = ?1 AND message_id = ?2"
                ),
                params![request.chat_id, request.message_id],
                retry_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Entries with `next_retry_at <= now`, earliest first, at most `limit`.
pub async fn due(
    db: &Database,
    now: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<RetryEntry>, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Vec<RetryEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RETRY_COLUMNS} FROM retry_queue
                 WHERE next_retry_at <= ?1
                 ORDER BY next_retry_at, id
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![format_ts(now), limit], retry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Record another failed attempt and push the entry back.
///
/// `attempt_count` never decreases, even if a stale caller passes a lower
/// value.
pub async fn reschedule(
    db: &Database,
    id: i64,
    attempt_count: u32,
    next_retry_at: DateTime<Utc>,
    last_error: Option<String>,
    now: DateTime<Utc>,
) -> Result<bool, BriefError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE retry_queue
                 SET attempt_count = MAX(attempt_count, ?1), next_retry_at = ?2,
                     last_error = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    attempt_count,
                    format_ts(next_retry_at),
                    last_error,
                    format_ts(now),
                    id
                ],
            )?;
            Ok(updated == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove an entry. Returns whether it existed.
pub async fn delete(db: &Database, id: i64) -> Result<bool, BriefError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute("DELETE FROM retry_queue WHERE id = ?1", params![id])? == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Give up on an entry: delete it, store the failure, and mark the message
/// processed as a non-order, in one transaction.
///
/// Returns `false` without writing anything if the entry was already gone,
/// so concurrent runs alert at most once.
pub async fn exhaust(
    db: &Database,
    id: i64,
    failure: NewParseFailure,
    now: DateTime<Utc>,
) -> Result<bool, BriefError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM retry_queue WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Ok(false);
            }
            insert_failure(&tx, &failure, now)?;
            upsert_marker(&tx, failure.chat_id, failure.message_id, false, now)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Drop the entry if its message already has an outcome.
pub async fn resolve_stale(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<StaleCheck, BriefError> {
    db.connection()
        .call(move |conn| -> Result<StaleCheck, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(entry) = load_entry(&tx, id)? else {
                return Ok(StaleCheck::Missing);
            };
            let processed: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM processed_messages WHERE chat_id = ?1 AND message_id = ?2",
                    params![entry.chat_id, entry.message_id],
                    |row| row.get(0),
                )
                .optional()?;
            let check = if processed.is_some() {
                StaleCheck::AlreadyProcessed
            } else if let Some(order) =
                load_order_by_message(&tx, entry.chat_id, entry.message_id)?
            {
                upsert_marker(&tx, entry.chat_id, entry.message_id, true, now)?;
                StaleCheck::OrderExists(order.id)
            } else {
                return Ok(StaleCheck::Fresh(entry));
            };
            tx.execute("DELETE FROM retry_queue WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(check)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<i64, BriefError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM retry_queue", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}
