// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail of order changes.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use brieftrack_core::{BriefError, LogKind, OrderStatus};

use crate::database::{Database, map_tr_err};
use crate::models::{Actor, StatusLogEntry, enum_col, format_ts, opt_enum_col, ts_col};

#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_log(
    conn: &Connection,
    order_id: i64,
    from: Option<OrderStatus>,
    to: OrderStatus,
    kind: LogKind,
    actor: &Actor,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO status_log
            (order_id, from_status, to_status, kind, actor_id, actor_name, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            order_id,
            from.map(|s| s.to_string()),
            to.to_string(),
            kind.to_string(),
            actor.id,
            actor.name,
            note,
            format_ts(now),
        ],
    )?;
    Ok(())
}

/// Audit rows for one order, oldest first.
pub async fn for_order(db: &Database, order_id: i64) -> Result<Vec<StatusLogEntry>, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Vec<StatusLogEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, order_id, from_status, to_status, kind, actor_id, actor_name,
                        note, created_at
                 FROM status_log WHERE order_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![order_id], |row| {
                Ok(StatusLogEntry {
                    id: row.get(0)?,
                    order_id: row.get(1)?,
                    from_status: opt_enum_col(row, 2)?,
                    to_status: enum_col(row, 3)?,
                    kind: enum_col(row, 4)?,
                    actor: Actor {
                        id: row.get(5)?,
                        name: row.get(6)?,
                    },
                    note: row.get(7)?,
                    created_at: ts_col(row, 8)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
