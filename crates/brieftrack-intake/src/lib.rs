// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brief intake for Brieftrack.
//!
//! Turns chat messages into tracked orders: heuristic pre-filter,
//! classification, idempotent order creation with a durable retry queue for
//! transient failures, and the operator actions and commands that move
//! orders through their lifecycle.

pub mod actions;
pub mod cards;
pub mod commands;
pub mod context;
pub mod outbound;
pub mod pending;
pub mod pipeline;
pub mod prefilter;
pub mod readiness;
pub mod retry;
pub mod sections;
pub mod service;

use std::sync::Arc;

use brieftrack_core::{BriefError, Classifier, Notifier};
use brieftrack_storage::{Database, SqliteStorage};

pub use commands::{CommandHandler, CommandOutcome};
pub use context::{ContextHandle, RoleDirectory, RuntimeContext, Sender};
pub use pipeline::{IntakeOutcome, IntakePipeline};
pub use retry::{RetryBatch, RetryProcessor};
pub use service::{EventOutcome, IgnoreReason, IntakeService};

/// The collaborators every intake component works against.
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<SqliteStorage>,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub context: ContextHandle,
}

impl Services {
    pub fn db(&self) -> Result<&Database, BriefError> {
        self.storage.database()
    }
}
