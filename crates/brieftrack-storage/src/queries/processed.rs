// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message idempotency markers and the permanent-failure record.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use brieftrack_core::BriefError;

use crate::database::{Database, map_tr_err};
use crate::models::{NewParseFailure, ParseFailure, format_ts, ts_col};

pub(crate) fn upsert_marker(
    conn: &Connection,
    chat_id: i64,
    message_id: i64,
    is_task: bool,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO processed_messages (chat_id, message_id, is_task, processed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (chat_id, message_id)
         DO UPDATE SET is_task = excluded.is_task, processed_at = excluded.processed_at",
        params![chat_id, message_id, is_task, format_ts(now)],
    )?;
    Ok(())
}

pub(crate) fn insert_failure(
    conn: &Connection,
    failure: &NewParseFailure,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO parse_failures (chat_id, message_id, raw_text, error_type, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            failure.chat_id,
            failure.message_id,
            failure.raw_text,
            failure.error_type,
            failure.detail,
            format_ts(now),
        ],
    )?;
    Ok(())
}

/// Whether the message already has a final outcome.
pub async fn is_processed(db: &Database, chat_id: i64, message_id: i64) -> Result<bool, BriefError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM processed_messages WHERE chat_id = ?1 AND message_id = ?2",
                    params![chat_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a final outcome for the message. Re-marking overwrites the outcome.
pub async fn mark_processed(
    db: &Database,
    chat_id: i64,
    message_id: i64,
    is_task: bool,
    now: DateTime<Utc>,
) -> Result<(), BriefError> {
    db.connection()
        .call(move |conn| upsert_marker(conn, chat_id, message_id, is_task, now))
        .await
        .map_err(map_tr_err)
}

/// Store a permanent failure and mark the message processed as a non-order,
/// atomically.
pub async fn record_failure(
    db: &Database,
    failure: NewParseFailure,
    now: DateTime<Utc>,
) -> Result<(), BriefError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            insert_failure(&tx, &failure, now)?;
            upsert_marker(&tx, failure.chat_id, failure.message_id, false, now)?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn failure_count(db: &Database) -> Result<i64, BriefError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM parse_failures", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

/// Most recent failures first.
pub async fn parse_failures(db: &Database, limit: u32) -> Result<Vec<ParseFailure>, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ParseFailure>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, message_id, raw_text, error_type, detail, created_at
                 FROM parse_failures ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(ParseFailure {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    message_id: row.get(2)?,
                    raw_text: row.get(3)?,
                    error_type: row.get(4)?,
                    detail: row.get(5)?,
                    created_at: ts_col(row, 6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("p.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn marker_roundtrip() {
        let (db, _dir) = setup_db().await;
        assert!(!is_processed(&db, 1, 2).await.unwrap());
        mark_processed(&db, 1, 2, false, Utc::now()).await.unwrap();
        assert!(is_processed(&db, 1, 2).await.unwrap());
        // Idempotent re-mark.
        mark_processed(&db, 1, 2, true, Utc::now()).await.unwrap();
        assert!(is_processed(&db, 1, 2).await.unwrap());
        assert!(!is_processed(&db, 1, 3).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failure_marks_message() {
        let (db, _dir) = setup_db().await;
        record_failure(
            &db,
            NewParseFailure {
                chat_id: 5,
                message_id: 6,
                raw_text: Some("text".into()),
                error_type: "api_error".into(),
                detail: Some("400 bad request".into()),
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(is_processed(&db, 5, 6).await.unwrap());
        let failures = parse_failures(&db, 10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error_type, "api_error");
        assert_eq!(failure_count(&db).await.unwrap(), 1);
        db.close().await.unwrap();
    }
}
