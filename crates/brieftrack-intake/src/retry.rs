// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry processor: re-runs classification for messages parked after a
//! transient failure.
//!
//! Each due entry is first checked against the current outcome of its
//! message. Failed attempts back off along the configured table until the
//! attempt cap or the time window is reached; the entry is then converted
//! into a parse failure and operators are alerted once.

use brieftrack_config::model::RetryConfig;
use brieftrack_core::{BriefError, ClassifyError};
use brieftrack_storage::queries::{processed, retry_queue};
use brieftrack_storage::{Actor, NewParseFailure, RetryEntry, StaleCheck};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::context::RuntimeContext;
use crate::outbound::alert_admins;
use crate::pipeline::{API_ERROR, Admission, Candidate, admit};
use crate::{Services, readiness};

/// Error type recorded when the retry budget runs out.
pub const RETRIES_EXHAUSTED: &str = "transient_retries_exhausted";

/// Upper bound for configured minute values (ten years).
const MAX_MINUTES: u64 = 10 * 365 * 24 * 60;

fn minutes(value: u64) -> Duration {
    Duration::minutes(value.min(MAX_MINUTES) as i64)
}

/// Delay before the next attempt after `attempts` failures. The last entry
/// of the table repeats.
pub fn backoff_delay(backoff_minutes: &[u64], attempts: u32) -> Duration {
    let idx = (attempts.saturating_sub(1) as usize).min(backoff_minutes.len().saturating_sub(1));
    minutes(backoff_minutes.get(idx).copied().unwrap_or(1))
}

/// Whether an entry with `attempts` failures has used up its budget.
pub fn is_exhausted(
    config: &RetryConfig,
    attempts: u32,
    first_enqueued_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    attempts >= config.max_attempts || now - first_enqueued_at >= minutes(config.max_window_minutes)
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Deleted by someone else before we got to it.
    Gone,
    /// The message already had an outcome; the entry was dropped.
    Stale,
    Rescheduled {
        attempts: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// Budget spent. `alerted` is false if a concurrent run got there first.
    Exhausted { alerted: bool },
    /// Permanent classifier failure.
    Failed,
    NotABrief,
    Created { order_id: i64 },
    AlreadyTracked(i64),
}

/// Tally of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryBatch {
    pub seen: usize,
    pub created: usize,
    pub rescheduled: usize,
    pub exhausted: usize,
    pub dropped: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct RetryProcessor {
    services: Services,
}

impl RetryProcessor {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Process up to `batch_size` due entries, oldest first.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RetryBatch, BriefError> {
        let ctx = self.services.context.load();
        let report = readiness::evaluate(&ctx.config);
        if !report.is_ready() {
            debug!(blockers = ?report.blocker_codes(), "retry pass skipped: service not ready");
            return Ok(RetryBatch::default());
        }

        let db = self.services.db()?;
        let due = retry_queue::due(db, now, ctx.config.retry.batch_size).await?;
        let mut batch = RetryBatch {
            seen: due.len(),
            ..Default::default()
        };
        for entry in due {
            match self.process_entry(&ctx, entry.id, now).await {
                Ok(RetryOutcome::Created { .. }) => batch.created += 1,
                Ok(RetryOutcome::Rescheduled { .. }) => batch.rescheduled += 1,
                Ok(RetryOutcome::Exhausted { .. }) => batch.exhausted += 1,
                Ok(_) => batch.dropped += 1,
                Err(e) => {
                    batch.errors += 1;
                    error!(retry_id = entry.id, message_id = entry.message_id, error = %e, "retry entry failed");
                }
            }
        }
        if batch.seen > 0 {
            info!(
                seen = batch.seen,
                created = batch.created,
                rescheduled = batch.rescheduled,
                exhausted = batch.exhausted,
                dropped = batch.dropped,
                errors = batch.errors,
                "retry pass complete"
            );
        }
        Ok(batch)
    }

    pub async fn process_entry(
        &self,
        ctx: &RuntimeContext,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, BriefError> {
        let db = self.services.db()?;
        let entry = match retry_queue::resolve_stale(db, id, now).await? {
            StaleCheck::Fresh(entry) => entry,
            StaleCheck::Missing => return Ok(RetryOutcome::Gone),
            StaleCheck::AlreadyProcessed => {
                debug!(retry_id = id, "retry entry dropped: message already processed");
                return Ok(RetryOutcome::Stale);
            }
            StaleCheck::OrderExists(order_id) => {
                debug!(retry_id = id, order_id, "retry entry dropped: order exists");
                return Ok(RetryOutcome::Stale);
            }
        };

        let classification = match self
            .services
            .classifier
            .classify(&entry.raw_text, entry.has_photo)
            .await
        {
            Ok(c) => c,
            Err(ClassifyError::Transient { message }) => {
                return self.fail_attempt(ctx, entry, message, now).await;
            }
            Err(ClassifyError::Permanent { message }) => {
                warn!(retry_id = id, message_id = entry.message_id, error = %message, "retry hit permanent failure");
                retry_queue::exhaust(
                    db,
                    id,
                    NewParseFailure {
                        chat_id: entry.chat_id,
                        message_id: entry.message_id,
                        raw_text: Some(entry.raw_text.clone()),
                        error_type: API_ERROR.to_string(),
                        detail: Some(message),
                    },
                    now,
                )
                .await?;
                return Ok(RetryOutcome::Failed);
            }
        };

        let Some(fields) = classification.accepted_fields(ctx.confidence_threshold()) else {
            info!(
                retry_id = id,
                message_id = entry.message_id,
                confidence = classification.confidence,
                "retried message is not a brief"
            );
            processed::mark_processed(db, entry.chat_id, entry.message_id, false, now).await?;
            retry_queue::delete(db, id).await?;
            return Ok(RetryOutcome::NotABrief);
        };

        let candidate = Candidate {
            chat_id: entry.chat_id,
            message_id: entry.message_id,
            topic_id: entry.topic_id,
            raw_text: entry.raw_text.clone(),
            sender_username: entry.sender_username.clone(),
            fields: fields.clone(),
            confidence: Some(classification.confidence),
            actor: Actor::bot(),
        };
        match admit(&self.services, ctx, candidate, now).await {
            Ok(admission) => {
                retry_queue::delete(db, id).await?;
                Ok(match admission {
                    Admission::Created { order, .. } => RetryOutcome::Created { order_id: order.id },
                    Admission::Existing(order) => RetryOutcome::AlreadyTracked(order.id),
                })
            }
            Err(e) => {
                self.fail_attempt(ctx, entry, format!("order_create_failed: {e}"), now)
                    .await
            }
        }
    }

    async fn fail_attempt(
        &self,
        ctx: &RuntimeContext,
        entry: RetryEntry,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, BriefError> {
        let db = self.services.db()?;
        let attempts = entry.attempt_count.saturating_add(1);
        let config = &ctx.config.retry;

        if !is_exhausted(config, attempts, entry.first_enqueued_at, now) {
            let next_retry_at = now + backoff_delay(&config.backoff_minutes, attempts);
            retry_queue::reschedule(db, entry.id, attempts, next_retry_at, Some(error), now)
                .await?;
            warn!(
                retry_id = entry.id,
                message_id = entry.message_id,
                attempt = attempts,
                next_retry_at = %next_retry_at,
                "retry attempt failed, rescheduled"
            );
            return Ok(RetryOutcome::Rescheduled {
                attempts,
                next_retry_at,
            });
        }

        let removed = retry_queue::exhaust(
            db,
            entry.id,
            NewParseFailure {
                chat_id: entry.chat_id,
                message_id: entry.message_id,
                raw_text: Some(entry.raw_text.clone()),
                error_type: RETRIES_EXHAUSTED.to_string(),
                detail: Some(error),
            },
            now,
        )
        .await?;
        if !removed {
            return Ok(RetryOutcome::Exhausted { alerted: false });
        }

        error!(
            retry_id = entry.id,
            message_id = entry.message_id,
            attempt = attempts,
            "retries exhausted"
        );
        let alerted = alert_admins(
            self.services.notifier.as_ref(),
            ctx,
            entry.chat_id,
            entry.topic_id,
            Some(entry.message_id),
            &format!(
                "Could not recognise this brief after {attempts} attempts. Reply to it with /add to register it."
            ),
        )
        .await;
        Ok(RetryOutcome::Exhausted { alerted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn backoff_follows_table_then_repeats_last() {
        let table = [2, 5, 10, 20, 40];
        assert_eq!(backoff_delay(&table, 1), Duration::minutes(2));
        assert_eq!(backoff_delay(&table, 2), Duration::minutes(5));
        assert_eq!(backoff_delay(&table, 5), Duration::minutes(40));
        assert_eq!(backoff_delay(&table, 9), Duration::minutes(40));
        assert_eq!(backoff_delay(&[], 3), Duration::minutes(1));
    }

    #[test]
    fn exhaustion_by_count_or_window() {
        let config = RetryConfig::default();
        let start = Utc::now();
        assert!(!is_exhausted(&config, 1, start, start));
        assert!(is_exhausted(&config, config.max_attempts, start, start));
        let window = Duration::minutes(config.max_window_minutes as i64);
        assert!(is_exhausted(&config, 1, start, start + window));
        assert!(!is_exhausted(&config, 1, start, start + window - Duration::seconds(1)));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic(
            mut table in proptest::collection::vec(1u64..500, 1..8),
            a in 0u32..20,
            b in 0u32..20,
        ) {
            table.sort_unstable();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(backoff_delay(&table, lo) <= backoff_delay(&table, hi));
        }

        #[test]
        fn backoff_never_exceeds_last_entry(
            table in proptest::collection::vec(1u64..500, 1..8),
            attempts in 0u32..100,
        ) {
            let max = *table.iter().max().unwrap();
            prop_assert!(backoff_delay(&table, attempts) <= Duration::minutes(max as i64));
        }
    }
}
