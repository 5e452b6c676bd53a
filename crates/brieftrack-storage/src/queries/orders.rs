// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order persistence and the write side of the lifecycle state machine.
//!
//! Every mutation runs in one transaction that updates the order and appends
//! its status-log row together. Domain rejections (invalid transition, missing
//! order) are returned as the inner `Result` of the connection closure so the
//! transaction is dropped, and therefore rolled back, before they surface.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use strum::IntoEnumIterator;

use brieftrack_core::lifecycle::validate_transition;
use brieftrack_core::{BriefError, BriefFields, LifecycleStamps, LogKind, OrderStatus};

use crate::database::{Database, map_tr_err};
use crate::models::{
    Actor, NewOrder, ORDER_COLUMNS, Order, OrderCreation, OriginalSections, format_date,
    format_ts, order_from_row,
};
use crate::queries::processed::upsert_marker;
use crate::queries::status_log::insert_log;

/// Note written when a forced transition carries no explicit note.
pub const FORCED_NOTE: &str = "forced_status_update";

/// Latest date that still compares correctly as ISO text.
const FAR_FUTURE: &str = "9999-12-31";

/// SQL list of the statuses whose deadline can still slip, e.g.
/// `('draft', 'processing')`.
fn open_statuses() -> String {
    let quoted: Vec<String> = OrderStatus::iter()
        .filter(|s| s.counts_towards_overdue())
        .map(|s| format!("'{s}'"))
        .collect();
    format!("({})", quoted.join(", "))
}

pub(crate) fn load_order(conn: &Connection, id: i64) -> rusqlite::Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
        params![id],
        order_from_row,
    )
    .optional()
}

pub(crate) fn load_order_by_message(
    conn: &Connection,
    chat_id: i64,
    message_id: i64,
) -> rusqlite::Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE chat_id = ?1 AND message_id = ?2"),
        params![chat_id, message_id],
        order_from_row,
    )
    .optional()
}

fn query_orders(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Order>> {
    let mut stmt = conn.prepare(&format!("SELECT {ORDER_COLUMNS} FROM orders {filter}"))?;
    let rows = stmt.query_map(params, order_from_row)?;
    rows.collect()
}

/// Create an order for a (chat, message) pair, idempotently.
///
/// Writes the order, its creation log row, and the processed-message marker
/// in one transaction. If a row for the pair already exists (an earlier run,
/// a concurrent retry, or an edit) nothing is inserted and the existing order
/// is returned with `created = false`.
pub async fn create_order(
    db: &Database,
    new: NewOrder,
    now: DateTime<Utc>,
) -> Result<OrderCreation, BriefError> {
    db.connection()
        .call(move |conn| -> Result<OrderCreation, rusqlite::Error> {
            let tx = conn.transaction()?;
            let stamps = LifecycleStamps::default().entering(new.status, now);
            let fields = &new.fields;
            let now_s = format_ts(now);

            let inserted = tx.execute(
                "INSERT INTO orders (
                    chat_id, message_id, topic_id, sender_username, task_date, fan_link,
                    fan_name, platform, amount_total, amount_paid, amount_remaining,
                    payment_note, duration, description, outfit, notes,
                    description_original, outfit_original, notes_original, priority,
                    deadline, status, finished_at, delivered_at, raw_text, ai_confidence,
                    created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                           ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                           ?27, ?27)
                 ON CONFLICT (chat_id, message_id) DO NOTHING",
                params![
                    new.chat_id,
                    new.message_id,
                    new.topic_id,
                    new.sender_username,
                    fields.task_date.map(format_date),
                    fields.fan_link,
                    fields.fan_name,
                    fields.platform.map(|p| p.to_string()),
                    fields.amount_total,
                    fields.amount_paid,
                    fields.amount_remaining,
                    fields.payment_note,
                    fields.duration,
                    fields.description,
                    fields.outfit,
                    fields.notes,
                    new.originals.description,
                    new.originals.outfit,
                    new.originals.notes,
                    fields.priority.to_string(),
                    fields.deadline.map(format_date),
                    new.status.to_string(),
                    stamps.finished_at.map(format_ts),
                    stamps.delivered_at.map(format_ts),
                    new.raw_text,
                    new.ai_confidence,
                    now_s,
                ],
            )?;

            let created = inserted == 1;
            if created {
                let id = tx.last_insert_rowid();
                let note = if new.ai_confidence.is_some() {
                    "auto-detected"
                } else {
                    "manual"
                };
                insert_log(
                    &tx,
                    id,
                    None,
                    new.status,
                    LogKind::Created,
                    &new.actor,
                    Some(note),
                    now,
                )?;
            }
            upsert_marker(&tx, new.chat_id, new.message_id, true, now)?;

            let order = load_order_by_message(&tx, new.chat_id, new.message_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(OrderCreation { order, created })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_order(db: &Database, id: i64) -> Result<Option<Order>, BriefError> {
    db.connection()
        .call(move |conn| load_order(conn, id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_message(
    db: &Database,
    chat_id: i64,
    message_id: i64,
) -> Result<Option<Order>, BriefError> {
    db.connection()
        .call(move |conn| load_order_by_message(conn, chat_id, message_id))
        .await
        .map_err(map_tr_err)
}

/// Order whose card is the given bot message.
pub async fn find_by_bot_message(
    db: &Database,
    chat_id: i64,
    bot_message_id: i64,
) -> Result<Option<Order>, BriefError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE chat_id = ?1 AND bot_message_id = ?2"
                ),
                params![chat_id, bot_message_id],
                order_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

fn apply_status(
    conn: &Connection,
    order: Order,
    to: OrderStatus,
    kind: LogKind,
    actor: &Actor,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<Order> {
    let stamps = order.stamps.entering(to, now);
    conn.execute(
        "UPDATE orders
         SET status = ?1, finished_at = ?2, delivered_at = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            to.to_string(),
            stamps.finished_at.map(format_ts),
            stamps.delivered_at.map(format_ts),
            format_ts(now),
            order.id,
        ],
    )?;
    insert_log(conn, order.id, Some(order.status), to, kind, actor, note, now)?;
    Ok(Order {
        status: to,
        stamps,
        updated_at: now,
        ..order
    })
}

/// Move an order to `to`, enforcing the transition table.
///
/// Fails with [`BriefError::InvalidTransition`] (and changes nothing) when
/// `to` is not reachable from the current status.
pub async fn transition(
    db: &Database,
    id: i64,
    to: OrderStatus,
    actor: Actor,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Order, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<Order, BriefError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(order) = load_order(&tx, id)? else {
                return Ok(Err(BriefError::OrderNotFound(id)));
            };
            if let Err(e) = validate_transition(order.status, to) {
                return Ok(Err(e));
            }
            let order = apply_status(
                &tx,
                order,
                to,
                LogKind::Transition,
                &actor,
                note.as_deref(),
                now,
            )?;
            tx.commit()?;
            Ok(Ok(order))
        })
        .await
        .map_err(map_tr_err)?
}

/// Set the status regardless of the transition table. Used for manual
/// correction; the audit row is tagged `forced`.
pub async fn force_transition(
    db: &Database,
    id: i64,
    to: OrderStatus,
    actor: Actor,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Order, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<Order, BriefError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(order) = load_order(&tx, id)? else {
                return Ok(Err(BriefError::OrderNotFound(id)));
            };
            let note = note.as_deref().unwrap_or(FORCED_NOTE);
            let order = apply_status(&tx, order, to, LogKind::Forced, &actor, Some(note), now)?;
            tx.commit()?;
            Ok(Ok(order))
        })
        .await
        .map_err(map_tr_err)?
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(format_date).unwrap_or_else(|| "none".to_string())
}

fn deadline_note(old: Option<NaiveDate>, new: Option<NaiveDate>) -> String {
    format!("deadline: {} → {}", display_date(old), display_date(new))
}

/// Same-status `note` row on the order's audit trail.
fn insert_note(
    conn: &Connection,
    order: &Order,
    actor: &Actor,
    note: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    insert_log(
        conn,
        order.id,
        Some(order.status),
        order.status,
        LogKind::Note,
        actor,
        Some(note),
        now,
    )
}

/// Change the deadline. Writes a same-status `note` row
/// (`deadline: <old> → <new>`).
pub async fn update_deadline(
    db: &Database,
    id: i64,
    deadline: Option<NaiveDate>,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<Order, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<Order, BriefError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(mut order) = load_order(&tx, id)? else {
                return Ok(Err(BriefError::OrderNotFound(id)));
            };
            tx.execute(
                "UPDATE orders SET deadline = ?1, updated_at = ?2 WHERE id = ?3",
                params![deadline.map(format_date), format_ts(now), id],
            )?;
            let note = deadline_note(order.fields.deadline, deadline);
            insert_note(&tx, &order, &actor, &note, now)?;
            tx.commit()?;
            order.fields.deadline = deadline;
            order.updated_at = now;
            Ok(Ok(order))
        })
        .await
        .map_err(map_tr_err)?
}

/// Replace extracted fields after the source message was edited.
///
/// Status and lifecycle stamps are untouched. A changed deadline or priority
/// gets a same-status `note` row in the same transaction; other field changes
/// are not logged.
pub async fn update_from_edit(
    db: &Database,
    id: i64,
    fields: BriefFields,
    originals: OriginalSections,
    raw_text: String,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<Order, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<Order, BriefError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(before) = load_order(&tx, id)? else {
                return Ok(Err(BriefError::OrderNotFound(id)));
            };
            tx.execute(
                "UPDATE orders SET
                    task_date = ?1, fan_link = ?2, fan_name = ?3, platform = ?4,
                    amount_total = ?5, amount_paid = ?6, amount_remaining = ?7,
                    payment_note = ?8, duration = ?9, description = ?10, outfit = ?11,
                    notes = ?12, description_original = ?13, outfit_original = ?14,
                    notes_original = ?15, priority = ?16, deadline = ?17, raw_text = ?18,
                    updated_at = ?19
                 WHERE id = ?20",
                params![
                    fields.task_date.map(format_date),
                    fields.fan_link,
                    fields.fan_name,
                    fields.platform.map(|p| p.to_string()),
                    fields.amount_total,
                    fields.amount_paid,
                    fields.amount_remaining,
                    fields.payment_note,
                    fields.duration,
                    fields.description,
                    fields.outfit,
                    fields.notes,
                    originals.description,
                    originals.outfit,
                    originals.notes,
                    fields.priority.to_string(),
                    fields.deadline.map(format_date),
                    raw_text,
                    format_ts(now),
                    id,
                ],
            )?;
            if before.fields.deadline != fields.deadline {
                let note = deadline_note(before.fields.deadline, fields.deadline);
                insert_note(&tx, &before, &actor, &note, now)?;
            }
            if before.fields.priority != fields.priority {
                let note = format!("priority: {} → {}", before.fields.priority, fields.priority);
                insert_note(&tx, &before, &actor, &note, now)?;
            }
            let order = load_order(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(Ok(order))
        })
        .await
        .map_err(map_tr_err)?
}

/// Remember which bot message shows this order's card.
pub async fn bind_bot_message(
    db: &Database,
    id: i64,
    bot_message_id: i64,
    now: DateTime<Utc>,
) -> Result<(), BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<(), BriefError>, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE orders SET bot_message_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![bot_message_id, format_ts(now), id],
            )?;
            Ok(if updated == 0 {
                Err(BriefError::OrderNotFound(id))
            } else {
                Ok(())
            })
        })
        .await
        .map_err(map_tr_err)?
}

/// Physically delete an order that is still a draft ("not a brief").
///
/// The processed-message marker is kept so the message is not re-detected.
pub async fn delete_draft(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<Order, BriefError> {
    db.connection()
        .call(move |conn| -> Result<Result<Order, BriefError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(order) = load_order(&tx, id)? else {
                return Ok(Err(BriefError::OrderNotFound(id)));
            };
            if order.status != OrderStatus::Draft {
                return Ok(Err(BriefError::OrderNotDraft {
                    id,
                    status: order.status,
                }));
            }
            tx.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
            upsert_marker(&tx, order.chat_id, order.message_id, false, now)?;
            tx.commit()?;
            Ok(Ok(order))
        })
        .await
        .map_err(map_tr_err)?
}

/// Orders not yet delivered or cancelled, earliest deadline first
/// (no deadline last), then oldest first.
pub async fn active_orders(db: &Database) -> Result<Vec<Order>, BriefError> {
    db.connection()
        .call(|conn| {
            query_orders(
                conn,
                "WHERE status NOT IN ('delivered', 'cancelled')
                 ORDER BY deadline IS NULL, deadline, created_at",
                [],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Open orders whose deadline is before `today`.
pub async fn overdue_orders(db: &Database, today: NaiveDate) -> Result<Vec<Order>, BriefError> {
    let open = open_statuses();
    db.connection()
        .call(move |conn| {
            query_orders(
                conn,
                &format!(
                    "WHERE deadline IS NOT NULL AND deadline < ?1 AND status IN {open}
                     ORDER BY deadline, id"
                ),
                params![format_date(today)],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Open orders with a deadline in `today..=today + days`.
pub async fn orders_due_within(
    db: &Database,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<Order>, BriefError> {
    let until = today
        .checked_add_days(chrono::Days::new(u64::from(days)))
        .filter(|d| d.year() <= 9999)
        .map_or_else(|| FAR_FUTURE.to_string(), format_date);
    let open = open_statuses();
    db.connection()
        .call(move |conn| {
            query_orders(
                conn,
                &format!(
                    "WHERE deadline IS NOT NULL AND deadline >= ?1 AND deadline <= ?2
                       AND status IN {open}
                     ORDER BY deadline, id"
                ),
                params![format_date(today), until],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Orders sitting in `finished` since at or before `cutoff`.
pub async fn finished_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Order>, BriefError> {
    db.connection()
        .call(move |conn| {
            query_orders(
                conn,
                "WHERE status = 'finished' AND finished_at IS NOT NULL AND finished_at <= ?1
                 ORDER BY finished_at, id",
                params![format_ts(cutoff)],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp `last_reminder_at` on every listed order.
pub async fn mark_reminded(
    db: &Database,
    ids: Vec<i64>,
    at: DateTime<Utc>,
) -> Result<(), BriefError> {
    if ids.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("UPDATE orders SET last_reminder_at = ?1 WHERE id = ?2")?;
                let at = format_ts(at);
                for id in &ids {
                    stmt.execute(params![at, id])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of orders per status, for every status that has at least one.
pub async fn status_counts(db: &Database) -> Result<Vec<(OrderStatus, i64)>, BriefError> {
    db.connection()
        .call(|conn| -> Result<Vec<(OrderStatus, i64)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM orders GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((crate::models::enum_col(row, 0)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{processed, status_log};
    use brieftrack_core::Priority;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn draft(chat_id: i64, message_id: i64) -> NewOrder {
        NewOrder {
            chat_id,
            message_id,
            topic_id: Some(7),
            sender_username: Some("lead".into()),
            fields: BriefFields {
                amount_total: Some(80.0),
                description: Some("custom video".into()),
                ..Default::default()
            },
            originals: OriginalSections::default(),
            status: OrderStatus::Draft,
            raw_text: Some("📦 order description".into()),
            ai_confidence: Some(0.95),
            actor: Actor::bot(),
        }
    }

    #[tokio::test]
    async fn create_writes_order_log_and_marker() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let creation = create_order(&db, draft(-100, 1), now).await.unwrap();
        assert!(creation.created);
        assert_eq!(creation.order.status, OrderStatus::Draft);
        assert_eq!(creation.order.fields.amount_total, Some(80.0));

        let log = status_log::for_order(&db, creation.order.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from_status, None);
        assert_eq!(log[0].to_status, OrderStatus::Draft);
        assert_eq!(log[0].kind, LogKind::Created);
        assert_eq!(log[0].note.as_deref(), Some("auto-detected"));

        assert!(processed::is_processed(&db, -100, 1).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_twice_returns_existing() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let first = create_order(&db, draft(-100, 1), now).await.unwrap();
        let second = create_order(&db, draft(-100, 1), now).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.order.id, second.order.id);

        let log = status_log::for_order(&db, first.order.id).await.unwrap();
        assert_eq!(log.len(), 1, "no duplicate creation row");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_order() {
        let (db, _dir) = setup_db().await;
        let db = std::sync::Arc::new(db);
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                create_order(&db, draft(-100, 5), now).await
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(active_orders(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn manual_order_starting_later_gets_stamps() {
        let (db, _dir) = setup_db().await;
        let mut new = draft(-100, 2);
        new.status = OrderStatus::Finished;
        new.ai_confidence = None;
        let order = create_order(&db, new, Utc::now()).await.unwrap().order;
        assert!(order.stamps.finished_at.is_some());
        let log = status_log::for_order(&db, order.id).await.unwrap();
        assert_eq!(log[0].note.as_deref(), Some("manual"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_lifecycle_sets_stamps_in_order() {
        let (db, _dir) = setup_db().await;
        let t0 = Utc::now();
        let id = create_order(&db, draft(-100, 3), t0).await.unwrap().order.id;

        let actor = Actor::new(1, "lead");
        transition(&db, id, OrderStatus::AwaitingConfirmation, actor.clone(), None, t0)
            .await
            .unwrap();
        transition(&db, id, OrderStatus::Processing, actor.clone(), None, t0)
            .await
            .unwrap();
        let finished = transition(
            &db,
            id,
            OrderStatus::Finished,
            actor.clone(),
            None,
            t0 + Duration::hours(1),
        )
        .await
        .unwrap();
        let delivered = transition(
            &db,
            id,
            OrderStatus::Delivered,
            actor,
            None,
            t0 + Duration::hours(2),
        )
        .await
        .unwrap();

        assert_eq!(delivered.stamps.finished_at, finished.stamps.finished_at);
        let (f, d) = (
            delivered.stamps.finished_at.unwrap(),
            delivered.stamps.delivered_at.unwrap(),
        );
        assert!(f <= d);

        let reloaded = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, OrderStatus::Delivered);
        assert_eq!(reloaded.stamps, delivered.stamps);

        let log = status_log::for_order(&db, id).await.unwrap();
        assert_eq!(log.len(), 5);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_transition_changes_nothing() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, draft(-100, 4), Utc::now())
            .await
            .unwrap()
            .order
            .id;

        let err = transition(
            &db,
            id,
            OrderStatus::Finished,
            Actor::system(),
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BriefError::InvalidTransition { .. }));

        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(status_log::for_order(&db, id).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn force_transition_bypasses_table_and_is_tagged() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = create_order(&db, draft(-100, 6), now).await.unwrap().order.id;
        let actor = Actor::new(9, "admin");
        transition(&db, id, OrderStatus::AwaitingConfirmation, actor.clone(), None, now)
            .await
            .unwrap();
        transition(&db, id, OrderStatus::Processing, actor.clone(), None, now)
            .await
            .unwrap();

        // The table rejects processing -> awaiting_confirmation ...
        assert!(
            transition(&db, id, OrderStatus::AwaitingConfirmation, actor.clone(), None, now)
                .await
                .is_err()
        );

        // ... but a forced update goes through.
        let order = force_transition(&db, id, OrderStatus::AwaitingConfirmation, actor, None, now)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::AwaitingConfirmation);

        let log = status_log::for_order(&db, id).await.unwrap();
        let last = log.last().unwrap();
        assert_eq!(last.kind, LogKind::Forced);
        assert_eq!(last.note.as_deref(), Some(FORCED_NOTE));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn forcing_back_from_delivered_clears_stamps() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = create_order(&db, draft(-100, 8), now).await.unwrap().order.id;
        force_transition(&db, id, OrderStatus::Delivered, Actor::system(), None, now)
            .await
            .unwrap();
        let order = force_transition(
            &db,
            id,
            OrderStatus::Processing,
            Actor::system(),
            Some("reopened".into()),
            now,
        )
        .await
        .unwrap();
        assert_eq!(order.stamps.finished_at, None);
        assert_eq!(order.stamps.delivered_at, None);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deadline_change_is_same_status_note() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, draft(-100, 9), Utc::now())
            .await
            .unwrap()
            .order
            .id;
        let new_deadline = NaiveDate::from_ymd_opt(2026, 2, 20);
        let order = update_deadline(&db, id, new_deadline, Actor::new(1, "lead"), Utc::now())
            .await
            .unwrap();
        assert_eq!(order.fields.deadline, new_deadline);
        assert_eq!(order.status, OrderStatus::Draft);

        let log = status_log::for_order(&db, id).await.unwrap();
        let note = log.last().unwrap();
        assert_eq!(note.kind, LogKind::Note);
        assert_eq!(note.from_status, Some(OrderStatus::Draft));
        assert_eq!(note.to_status, OrderStatus::Draft);
        assert_eq!(note.note.as_deref(), Some("deadline: none → 2026-02-20"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_only_drafts() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let keep = create_order(&db, draft(-100, 11), now).await.unwrap().order.id;
        let drop = create_order(&db, draft(-100, 12), now).await.unwrap().order.id;
        transition(&db, keep, OrderStatus::AwaitingConfirmation, Actor::system(), None, now)
            .await
            .unwrap();

        assert!(matches!(
            delete_draft(&db, keep, now).await.unwrap_err(),
            BriefError::OrderNotDraft { .. }
        ));
        delete_draft(&db, drop, now).await.unwrap();
        assert!(get_order(&db, drop).await.unwrap().is_none());
        // Still marked processed so it is not picked up again.
        assert!(processed::is_processed(&db, -100, 12).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn scans_select_by_deadline_and_status() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let overdue = create_order(&db, draft(-1, 1), now).await.unwrap().order.id;
        update_deadline(&db, overdue, today.pred_opt(), Actor::system(), now)
            .await
            .unwrap();
        let soon = create_order(&db, draft(-1, 2), now).await.unwrap().order.id;
        update_deadline(&db, soon, today.succ_opt(), Actor::system(), now)
            .await
            .unwrap();
        let shot = create_order(&db, draft(-1, 3), now).await.unwrap().order.id;
        update_deadline(&db, shot, today.pred_opt(), Actor::system(), now)
            .await
            .unwrap();
        force_transition(&db, shot, OrderStatus::Finished, Actor::system(), None, now)
            .await
            .unwrap();

        let ids = |orders: Vec<Order>| orders.into_iter().map(|o| o.id).collect::<Vec<_>>();
        assert_eq!(ids(overdue_orders(&db, today).await.unwrap()), vec![overdue]);
        assert_eq!(ids(orders_due_within(&db, today, 1).await.unwrap()), vec![soon]);
        assert_eq!(
            ids(finished_before(&db, now + Duration::seconds(1)).await.unwrap()),
            vec![shot]
        );
        assert!(finished_before(&db, now - Duration::hours(1)).await.unwrap().is_empty());

        let counts = status_counts(&db).await.unwrap();
        assert!(counts.contains(&(OrderStatus::Draft, 2)));
        assert!(counts.contains(&(OrderStatus::Finished, 1)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reminder_stamp_and_binding() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = create_order(&db, draft(-1, 20), now).await.unwrap().order.id;
        bind_bot_message(&db, id, 555, now).await.unwrap();
        mark_reminded(&db, vec![id], now).await.unwrap();

        let order = find_by_bot_message(&db, -1, 555).await.unwrap().unwrap();
        assert_eq!(order.id, id);
        assert!(order.last_reminder_at.is_some());
        assert!(matches!(
            bind_bot_message(&db, 999, 1, now).await.unwrap_err(),
            BriefError::OrderNotFound(999)
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edit_updates_fields_in_place() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = create_order(&db, draft(-1, 30), now).await.unwrap().order.id;
        let fields = BriefFields {
            amount_total: Some(120.0),
            priority: Priority::High,
            ..Default::default()
        };
        let order = update_from_edit(
            &db,
            id,
            fields,
            OriginalSections::default(),
            "edited".into(),
            Actor::new(4, "lead"),
            now,
        )
        .await
        .unwrap();
        assert_eq!(order.fields.amount_total, Some(120.0));
        assert_eq!(order.raw_text.as_deref(), Some("edited"));
        assert_eq!(order.status, OrderStatus::Draft);

        let log = status_log::for_order(&db, id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].kind, LogKind::Note);
        assert_eq!(log[1].from_status, Some(OrderStatus::Draft));
        assert_eq!(log[1].to_status, OrderStatus::Draft);
        assert_eq!(log[1].note.as_deref(), Some("priority: medium → high"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edit_logs_deadline_and_priority_changes() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let id = create_order(&db, draft(-1, 31), now).await.unwrap().order.id;
        let edited = |deadline, priority| BriefFields {
            amount_total: Some(80.0),
            description: Some("custom video".into()),
            deadline,
            priority,
            ..Default::default()
        };
        let deadline = NaiveDate::from_ymd_opt(2026, 4, 1);

        update_from_edit(
            &db,
            id,
            edited(deadline, Priority::High),
            OriginalSections::default(),
            "first edit".into(),
            Actor::bot(),
            now,
        )
        .await
        .unwrap();
        // Same deadline and priority again: nothing new on the trail.
        update_from_edit(
            &db,
            id,
            edited(deadline, Priority::High),
            OriginalSections::default(),
            "second edit".into(),
            Actor::bot(),
            now,
        )
        .await
        .unwrap();

        let notes: Vec<_> = status_log::for_order(&db, id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.kind == LogKind::Note)
            .map(|e| e.note.unwrap_or_default())
            .collect();
        assert_eq!(
            notes,
            vec![
                "deadline: none → 2026-04-01".to_string(),
                "priority: medium → high".to_string(),
            ]
        );

        assert!(matches!(
            update_from_edit(
                &db,
                999,
                BriefFields::default(),
                OriginalSections::default(),
                String::new(),
                Actor::bot(),
                now,
            )
            .await
            .unwrap_err(),
            BriefError::OrderNotFound(999)
        ));
        db.close().await.unwrap();
    }

    #[test]
    fn open_statuses_follow_the_lifecycle() {
        assert_eq!(
            open_statuses(),
            "('draft', 'awaiting_confirmation', 'processing')"
        );
    }
}
