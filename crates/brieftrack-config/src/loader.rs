// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./brieftrack.toml` > `~/.config/brieftrack/brieftrack.toml`
//! > `/etc/brieftrack/brieftrack.toml` with environment variable overrides via the
//! `BRIEFTRACK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BriefConfig;

/// Top-level sections recognised in environment variable names.
const SECTIONS: &[&str] = &[
    "service",
    "telegram",
    "anthropic",
    "storage",
    "intake",
    "retry",
    "reminders",
    "roles",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/brieftrack/brieftrack.toml` (system-wide)
/// 3. `~/.config/brieftrack/brieftrack.toml` (user XDG config)
/// 4. `./brieftrack.toml` (local directory)
/// 5. `BRIEFTRACK_*` environment variables
pub fn load_config() -> Result<BriefConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the defaults only.
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BriefConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BriefConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BriefConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BriefConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BriefConfig::default()))
        .merge(Toml::file("/etc/brieftrack/brieftrack.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("brieftrack/brieftrack.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("brieftrack.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `BRIEFTRACK_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `BRIEFTRACK_TELEGRAM_BOT_TOKEN` must become
/// `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("BRIEFTRACK_").map(|key| section_key(key.as_str()).into())
}

fn section_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
