// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduler loop.
//!
//! One task wakes every second, checks each named timer, and runs the due
//! jobs one after another. Intervals are read from the current runtime
//! snapshot on every wake, so a reload applies without a restart.

use std::sync::Arc;

use brieftrack_intake::{IntakeService, RuntimeContext};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::digest;
use crate::reminders;
use crate::timer::{DailyTimer, IntervalTimer};

/// Wake cadence of the loop.
pub const WAKE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

pub const RETRY_JOB: &str = "retry_queue";
pub const OVERDUE_JOB: &str = "overdue";
pub const HOURLY_JOB: &str = "hourly";
pub const DIGEST_JOB: &str = "digest";

/// Jobs that ran during one wake, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ran: Vec<&'static str>,
}

impl TickReport {
    pub fn ran(&self, job: &str) -> bool {
        self.ran.contains(&job)
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs.max(1))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn minutes(mins: u64) -> Duration {
    seconds(mins.saturating_mul(60))
}

/// Wall-clock time in the configured zone, UTC when the zone is invalid.
pub fn local_now(ctx: &RuntimeContext, now: DateTime<Utc>) -> NaiveDateTime {
    match ctx.timezone() {
        Some(tz) => now.with_timezone(&tz).naive_local(),
        None => now.naive_utc(),
    }
}

/// Owns the timers and drives the periodic jobs.
pub struct Scheduler {
    service: Arc<IntakeService>,
    retry: IntervalTimer,
    overdue: IntervalTimer,
    hourly: IntervalTimer,
    digest: DailyTimer,
}

impl Scheduler {
    pub fn new(service: Arc<IntakeService>) -> Self {
        Self {
            service,
            retry: IntervalTimer::new(RETRY_JOB),
            overdue: IntervalTimer::new(OVERDUE_JOB),
            hourly: IntervalTimer::new(HOURLY_JOB),
            digest: DailyTimer::new(DIGEST_JOB),
        }
    }

    /// Run every job that is due at `now`. Job errors are logged; the timer
    /// is still advanced so a failing store is not hammered every second.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let services = self.service.services();
        let ctx = services.context.load();
        let mut report = TickReport::default();

        if self.retry.is_due(now, seconds(ctx.config.retry.scan_interval_secs)) {
            match self.service.retry_processor().run_once(now).await {
                Ok(batch) => debug!(seen = batch.seen, "retry scan finished"),
                Err(e) => error!(job = RETRY_JOB, error = %e, "scheduled job failed"),
            }
            let purged = self.service.pending().purge_expired();
            if purged > 0 {
                debug!(purged, "expired prompts dropped");
            }
            self.retry.mark(now);
            report.ran.push(RETRY_JOB);
        }

        let reminders_config = &ctx.config.reminders;
        if self
            .overdue
            .is_due(now, minutes(reminders_config.overdue_check_interval_mins))
        {
            if let Err(e) = reminders::remind_overdue(services, &ctx, now).await {
                error!(job = OVERDUE_JOB, error = %e, "scheduled job failed");
            }
            self.overdue.mark(now);
            report.ran.push(OVERDUE_JOB);
        }

        if self
            .hourly
            .is_due(now, minutes(reminders_config.hourly_check_interval_mins))
        {
            if let Err(e) = reminders::remind_due_soon(services, &ctx, now).await {
                error!(job = HOURLY_JOB, error = %e, "due-soon reminder failed");
            }
            if let Err(e) = reminders::remind_delivery(services, &ctx, now).await {
                error!(job = HOURLY_JOB, error = %e, "delivery reminder failed");
            }
            self.hourly.mark(now);
            report.ran.push(HOURLY_JOB);
        }

        let local = local_now(&ctx, now);
        if self.digest.is_due(local, reminders_config.digest_hour) {
            if let Err(e) = digest::send_digest(services, &ctx, now).await {
                error!(job = DIGEST_JOB, error = %e, "scheduled job failed");
            }
            self.digest.mark(local);
            report.ran.push(DIGEST_JOB);
        }

        report
    }

    /// Wake every second until `cancel` fires. A wake in progress finishes
    /// its jobs before the loop observes cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(WAKE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if !report.ran.is_empty() {
                        debug!(jobs = ?report.ran, "scheduler wake");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}
