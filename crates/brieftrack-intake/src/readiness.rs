// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Readiness report: configuration problems that block processing, and
//! softer warnings.

use brieftrack_config::BriefConfig;
use chrono_tz::Tz;
use strum::{Display, IntoStaticStr};

/// A condition under which no message may be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Blocker {
    BotTokenMissing,
    BotTokenInvalidFormat,
    AnthropicApiKeyMissing,
    WorkingChatMissing,
    WorkingTopicMissing,
    AiModelMissing,
    TimezoneInvalid,
}

impl Blocker {
    /// Blockers that stop the service from starting at all.
    pub fn is_startup_fatal(self) -> bool {
        matches!(
            self,
            Blocker::BotTokenMissing
                | Blocker::BotTokenInvalidFormat
                | Blocker::AnthropicApiKeyMissing
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Blocker::BotTokenMissing => "telegram.bot_token is not set",
            Blocker::BotTokenInvalidFormat => "telegram.bot_token is not <digits>:<secret>",
            Blocker::AnthropicApiKeyMissing => "anthropic.api_key is not set",
            Blocker::WorkingChatMissing => "telegram.chat_id is not set",
            Blocker::WorkingTopicMissing => "telegram.topic_id is not set",
            Blocker::AiModelMissing => "anthropic.model is empty",
            Blocker::TimezoneInvalid => "reminders.timezone is not an IANA zone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Warning {
    ConfidenceThresholdOutOfRange,
    ReminderHoursBeforeInvalid,
    OverdueCooldownHoursInvalid,
    HighUrgencyCooldownHoursInvalid,
    FinishedReminderHoursInvalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub blockers: Vec<Blocker>,
    pub warnings: Vec<Warning>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn fatal_blockers(&self) -> Vec<Blocker> {
        self.blockers
            .iter()
            .copied()
            .filter(|b| b.is_startup_fatal())
            .collect()
    }

    pub fn blocker_codes(&self) -> Vec<String> {
        self.blockers.iter().map(ToString::to_string).collect()
    }
}

/// `<digits>:<secret>` with no whitespace anywhere.
pub fn is_valid_bot_token(token: &str) -> bool {
    if token.chars().any(char::is_whitespace) {
        return false;
    }
    match token.split_once(':') {
        Some((id, secret)) => {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
        }
        None => false,
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub fn evaluate(config: &BriefConfig) -> Readiness {
    let mut report = Readiness::default();

    match config.telegram.bot_token.as_deref().map(str::trim) {
        None | Some("") => report.blockers.push(Blocker::BotTokenMissing),
        Some(token) if !is_valid_bot_token(token) => {
            report.blockers.push(Blocker::BotTokenInvalidFormat)
        }
        Some(_) => {}
    }
    if blank(config.anthropic.api_key.as_deref()) {
        report.blockers.push(Blocker::AnthropicApiKeyMissing);
    }
    if config.telegram.chat_id.is_none_or(|id| id == 0) {
        report.blockers.push(Blocker::WorkingChatMissing);
    }
    if config.telegram.topic_id.is_none_or(|id| id == 0) {
        report.blockers.push(Blocker::WorkingTopicMissing);
    }
    if config.anthropic.model.trim().is_empty() {
        report.blockers.push(Blocker::AiModelMissing);
    }
    if config.reminders.timezone.trim().parse::<Tz>().is_err() {
        report.blockers.push(Blocker::TimezoneInvalid);
    }

    if !(0.0..=1.0).contains(&config.intake.confidence_threshold) {
        report.warnings.push(Warning::ConfidenceThresholdOutOfRange);
    }
    let reminders = &config.reminders;
    for (value, warning) in [
        (reminders.reminder_hours_before, Warning::ReminderHoursBeforeInvalid),
        (reminders.overdue_cooldown_hours, Warning::OverdueCooldownHoursInvalid),
        (
            reminders.high_urgency_cooldown_hours,
            Warning::HighUrgencyCooldownHoursInvalid,
        ),
        (reminders.finished_reminder_hours, Warning::FinishedReminderHoursInvalid),
    ] {
        if value <= 0 {
            report.warnings.push(warning);
        }
    }

    report
}
