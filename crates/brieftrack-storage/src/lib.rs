// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Brieftrack.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer model via
//! `tokio-rusqlite`. Holds orders and their append-only status log, the
//! transient-failure retry queue, per-message processed markers, and the
//! parse-failure record.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
pub use queries::retry_queue::StaleCheck;
