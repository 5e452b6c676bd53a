// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository-style operations, one module per table group.

pub mod orders;
pub mod processed;
pub mod retry_queue;
pub mod status_log;
