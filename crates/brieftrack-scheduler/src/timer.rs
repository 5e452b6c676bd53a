// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-if-due timers checked once per scheduler wake.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// A timer that fires every `every`, starting with the first check.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    name: &'static str,
    last_run: Option<DateTime<Utc>>,
}

impl IntervalTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            last_run: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// The interval is passed per check so a configuration reload takes
    /// effect on the next wake.
    pub fn is_due(&self, now: DateTime<Utc>, every: Duration) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now - last >= every,
        }
    }

    pub fn mark(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
    }
}

/// A timer that fires once per local date during a given hour.
#[derive(Debug, Clone)]
pub struct DailyTimer {
    name: &'static str,
    last_date: Option<NaiveDate>,
}

impl DailyTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            last_date: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_due(&self, local_now: NaiveDateTime, hour: u32) -> bool {
        local_now.hour() == hour && self.last_date != Some(local_now.date())
    }

    pub fn mark(&mut self, local_now: NaiveDateTime) {
        self.last_date = Some(local_now.date());
    }
}
