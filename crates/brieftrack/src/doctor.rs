// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brieftrack doctor` command implementation.
//!
//! Prints the effective configuration summary, readiness blockers and
//! warnings, and database checks.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use brieftrack_config::BriefConfig;
use brieftrack_core::BriefError;
use brieftrack_intake::readiness;
use brieftrack_storage::queries::{processed, retry_queue};
use brieftrack_storage::{Database, ParseFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check and print the report. Returns the number of failed
/// checks.
pub async fn run_doctor(
    config: &BriefConfig,
    config_file: Option<&Path>,
    plain: bool,
) -> usize {
    let use_color = !plain && std::io::stdout().is_terminal();

    let mut results = vec![check_config(config_file)];
    results.extend(check_readiness(config));
    results.push(check_database(&config.storage.database_path).await);
    results.push(check_db_integrity(&config.storage.database_path).await);
    results.push(check_retry_queue(&config.storage.database_path).await);

    println!();
    println!("  brieftrack doctor");
    println!("  {}", "-".repeat(50));
    println!(
        "    chat_id={} topic_id={} timezone={} model={}",
        display_opt(config.telegram.chat_id),
        display_opt(config.telegram.topic_id),
        config.reminders.timezone,
        config.anthropic.model
    );
    println!(
        "    database={} confidence_threshold={}",
        config.storage.database_path, config.intake.confidence_threshold
    );
    println!();

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        match result.status {
            CheckStatus::Fail => fail_count += 1,
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Pass => {}
        }
        println!("{}", render_line(result, use_color));
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    fail_count
}

fn display_opt(value: Option<i64>) -> String {
    value.map_or_else(|| "unset".to_string(), |v| v.to_string())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal().to_string()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow().to_string()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red().to_string()),
        };
        format!(
            "    {symbol} {:<34} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<34} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

fn check_config(config_file: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match config_file {
        Some(path) => brieftrack_config::load_and_validate_path(path),
        None => brieftrack_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// One line per blocker (fail) and warning (warn), or a single pass.
fn check_readiness(config: &BriefConfig) -> Vec<CheckResult> {
    let start = Instant::now();
    let report = readiness::evaluate(config);
    if report.blockers.is_empty() && report.warnings.is_empty() {
        return vec![CheckResult::new(
            "Readiness",
            CheckStatus::Pass,
            "ready",
            start,
        )];
    }

    let blockers = report.blockers.iter().map(|b| {
        let status = if b.is_startup_fatal() {
            "blocker (fatal at startup)"
        } else {
            "blocker"
        };
        CheckResult::new(
            &b.to_string(),
            CheckStatus::Fail,
            format!("{status}: {}", b.describe()),
            start,
        )
    });
    let warnings = report
        .warnings
        .iter()
        .map(|w| CheckResult::new(&w.to_string(), CheckStatus::Warn, "warning", start));
    blockers.chain(warnings).collect()
}

async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let query_result: Result<(), tokio_rusqlite::Error> = conn
                .call(|conn| {
                    conn.execute_batch("SELECT 1")?;
                    Ok(())
                })
                .await;
            match query_result {
                Ok(()) => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
                Err(e) => CheckResult::new(
                    "Database",
                    CheckStatus::Fail,
                    format!("query failed: {e}"),
                    start,
                ),
            }
        }
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("open failed: {e}"),
            start,
        ),
    }
}

async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "DB integrity",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };
    let result: Result<Vec<String>, tokio_rusqlite::Error> = conn
        .call(|conn| {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Pending retries and recorded parse failures, read through a read-only
/// handle so the check never migrates or creates the database.
async fn check_retry_queue(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Retry queue",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let db = match Database::open_read_only(db_path).await {
        Ok(db) => db,
        Err(e) => {
            return CheckResult::new(
                "Retry queue",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };
    let counts = async {
        let pending = retry_queue::count(&db).await?;
        let failures = processed::failure_count(&db).await?;
        let latest = processed::parse_failures(&db, 1).await?;
        Ok::<_, BriefError>((pending, failures, latest.into_iter().next()))
    }
    .await;

    let describe = |failures: i64, latest: Option<ParseFailure>| match latest {
        Some(last) => format!("{failures} parse failure(s) recorded, last: {}", last.error_type),
        None => format!("{failures} parse failure(s) recorded"),
    };
    match counts {
        Ok((0, failures, latest)) => CheckResult::new(
            "Retry queue",
            CheckStatus::Pass,
            format!("empty, {}", describe(failures, latest)),
            start,
        ),
        Ok((pending, failures, latest)) => CheckResult::new(
            "Retry queue",
            CheckStatus::Warn,
            format!("{pending} message(s) waiting, {}", describe(failures, latest)),
            start,
        ),
        // A missing table means the database has not been migrated yet.
        Err(e) => CheckResult::new(
            "Retry queue",
            CheckStatus::Warn,
            format!("not readable: {e}"),
            start,
        ),
    }
}
