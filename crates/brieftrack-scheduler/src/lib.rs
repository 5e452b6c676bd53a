// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background timers for Brieftrack.
//!
//! A single loop drives the retry-queue rescan, overdue checks, the hourly
//! due-soon and delivery reminders, and the daily morning digest.

pub mod digest;
pub mod reminders;
pub mod scheduler;
pub mod timer;

pub use scheduler::{Scheduler, TickReport};
