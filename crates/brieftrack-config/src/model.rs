// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Brieftrack.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Brieftrack configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BriefConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Telegram bot and working chat binding.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Anthropic API settings for the classifier.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pre-filter and confidence gating.
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Durable retry queue for transient classifier failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reminder scheduler cadence and cooldowns.
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Role directory (admins, teamleads, models).
    #[serde(default)]
    pub roles: RolesConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "brieftrack".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token (`<digits>:<secret>`).
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Working chat where briefs are posted.
    #[serde(default)]
    pub chat_id: Option<i64>,

    /// Forum topic inside the working chat.
    #[serde(default)]
    pub topic_id: Option<i64>,
}

/// Anthropic API configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for classification.
    #[serde(default = "default_model")]
    pub model: String,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Maximum tokens to generate per classification.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts made inline before escalating to the retry queue.
    #[serde(default = "default_max_inline_retries")]
    pub max_inline_retries: u32,

    /// Base delay of the inline exponential backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_inline_retries: default_max_inline_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_inline_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("brieftrack").join("brieftrack.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("brieftrack.db"))
        .to_string_lossy()
        .into_owned()
}

/// Pre-filter thresholds and marker sets, plus the confidence gate.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeConfig {
    /// Minimum classifier confidence for a task verdict to create an order.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Texts shorter than this (in characters) are rejected before scoring.
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    /// Texts longer than this earn the length signal.
    #[serde(default = "default_long_text_threshold")]
    pub long_text_threshold: usize,

    /// Minimum heuristic score to accept a message.
    #[serde(default = "default_min_heuristic_score")]
    pub min_heuristic_score: u32,

    /// Emojis typical of brief templates.
    #[serde(default = "default_marker_emojis")]
    pub marker_emojis: Vec<String>,

    /// Case-insensitive keywords typical of briefs.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Phrases that accept a message regardless of score.
    #[serde(default = "default_direct_markers")]
    pub direct_markers: Vec<String>,

    /// Substrings that signal a payment (currency sign, "minutes").
    #[serde(default = "default_payment_markers")]
    pub payment_markers: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_text_length: default_min_text_length(),
            long_text_threshold: default_long_text_threshold(),
            min_heuristic_score: default_min_heuristic_score(),
            marker_emojis: default_marker_emojis(),
            keywords: default_keywords(),
            direct_markers: default_direct_markers(),
            payment_markers: default_payment_markers(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_min_text_length() -> usize {
    30
}

fn default_long_text_threshold() -> usize {
    100
}

fn default_min_heuristic_score() -> u32 {
    2
}

fn default_marker_emojis() -> Vec<String> {
    ["📦", "🎬", "👗", "📝", "🔥", "📅"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_keywords() -> Vec<String> {
    [
        "описание заказа",
        "оплата",
        "длительность",
        "срочность",
        "дедлайн",
        "покупатель",
        "deadline",
        "buyer",
        "payment",
        "duration",
        "urgency",
        "order description",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_direct_markers() -> Vec<String> {
    ["📦 описание заказа", "📦 order"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_payment_markers() -> Vec<String> {
    ["$", "минут"].into_iter().map(String::from).collect()
}

/// Retry queue configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Delay before attempt N+1, indexed by attempt count (clamped to the last entry).
    #[serde(default = "default_backoff_minutes")]
    pub backoff_minutes: Vec<u64>,

    /// Attempts after which an entry is exhausted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum time since first enqueue before an entry is exhausted.
    #[serde(default = "default_max_window_minutes")]
    pub max_window_minutes: u64,

    /// Entries processed per rescan.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Rescan interval in seconds.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_minutes: default_backoff_minutes(),
            max_attempts: default_max_attempts(),
            max_window_minutes: default_max_window_minutes(),
            batch_size: default_batch_size(),
            scan_interval_secs: default_scan_interval_secs(),
        }
    }
}

fn default_backoff_minutes() -> Vec<u64> {
    vec![2, 5, 10, 20, 40]
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_window_minutes() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    20
}

fn default_scan_interval_secs() -> u64 {
    60
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderConfig {
    /// IANA timezone used for "today" and the digest hour.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// How far ahead a deadline counts as "due soon".
    #[serde(default = "default_reminder_hours_before")]
    pub reminder_hours_before: i64,

    /// Minimum hours between reminders for the same order.
    #[serde(default = "default_overdue_cooldown_hours")]
    pub overdue_cooldown_hours: i64,

    /// Cooldown for high-priority orders.
    #[serde(default = "default_high_urgency_cooldown_hours")]
    pub high_urgency_cooldown_hours: i64,

    /// Hours an order may sit in `finished` before a delivery reminder.
    #[serde(default = "default_finished_reminder_hours")]
    pub finished_reminder_hours: i64,

    /// Overdue scan interval in minutes.
    #[serde(default = "default_overdue_check_interval_mins")]
    pub overdue_check_interval_mins: u64,

    /// Due-soon and delivery scan interval in minutes.
    #[serde(default = "default_hourly_check_interval_mins")]
    pub hourly_check_interval_mins: u64,

    /// Local hour (0-23) at which the morning digest is posted.
    #[serde(default = "default_digest_hour")]
    pub digest_hour: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            reminder_hours_before: default_reminder_hours_before(),
            overdue_cooldown_hours: default_overdue_cooldown_hours(),
            high_urgency_cooldown_hours: default_high_urgency_cooldown_hours(),
            finished_reminder_hours: default_finished_reminder_hours(),
            overdue_check_interval_mins: default_overdue_check_interval_mins(),
            hourly_check_interval_mins: default_hourly_check_interval_mins(),
            digest_hour: default_digest_hour(),
        }
    }
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_reminder_hours_before() -> i64 {
    24
}

fn default_overdue_cooldown_hours() -> i64 {
    4
}

fn default_high_urgency_cooldown_hours() -> i64 {
    2
}

fn default_finished_reminder_hours() -> i64 {
    24
}

fn default_overdue_check_interval_mins() -> u64 {
    30
}

fn default_hourly_check_interval_mins() -> u64 {
    60
}

fn default_digest_hour() -> u32 {
    9
}

/// Role directory. Usernames are matched case-insensitively without `@`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default)]
    pub admin_usernames: Vec<String>,
    #[serde(default)]
    pub teamlead_ids: Vec<i64>,
    #[serde(default)]
    pub teamlead_usernames: Vec<String>,
    #[serde(default)]
    pub model_ids: Vec<i64>,
    #[serde(default)]
    pub model_usernames: Vec<String>,
}
