// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Only structural problems that make the process unable to run belong here.
//! Missing credentials and out-of-range operator settings are reported by the
//! readiness check instead, so a half-configured deployment can still start
//! `doctor`.

use chrono_tz::Tz;

use crate::diagnostic::ConfigError;
use crate::model::BriefConfig;

/// Validate a deserialized configuration, collecting every error.
pub fn validate_config(config: &BriefConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let retry = &config.retry;
    if retry.backoff_minutes.is_empty() {
        errors.push(ConfigError::validation(
            "retry.backoff_minutes must contain at least one entry",
        ));
    } else if retry.backoff_minutes.windows(2).any(|w| w[0] > w[1]) {
        errors.push(ConfigError::validation(format!(
            "retry.backoff_minutes must be non-decreasing, got {:?}",
            retry.backoff_minutes
        )));
    }
    if retry.backoff_minutes.first() == Some(&0) {
        errors.push(ConfigError::validation(
            "retry.backoff_minutes entries must be positive",
        ));
    }
    if retry.max_attempts == 0 {
        errors.push(ConfigError::validation("retry.max_attempts must be at least 1"));
    }
    if retry.batch_size == 0 {
        errors.push(ConfigError::validation("retry.batch_size must be at least 1"));
    }
    if retry.scan_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "retry.scan_interval_secs must be at least 1",
        ));
    }

    let reminders = &config.reminders;
    if reminders.digest_hour > 23 {
        errors.push(ConfigError::validation(format!(
            "reminders.digest_hour must be within 0..=23, got {}",
            reminders.digest_hour
        )));
    }
    if reminders.timezone.parse::<Tz>().is_err() {
        errors.push(ConfigError::validation(format!(
            "reminders.timezone `{}` is not an IANA timezone",
            reminders.timezone
        )));
    }
    if reminders.overdue_check_interval_mins == 0 || reminders.hourly_check_interval_mins == 0 {
        errors.push(ConfigError::validation(
            "reminders check intervals must be at least 1 minute",
        ));
    }

    let intake = &config.intake;
    if intake.min_heuristic_score > 5 {
        errors.push(ConfigError::validation(format!(
            "intake.min_heuristic_score can never be reached (max 5), got {}",
            intake.min_heuristic_score
        )));
    }

    if config.anthropic.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "anthropic.timeout_secs must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
