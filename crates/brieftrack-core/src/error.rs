// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the Brieftrack workspace.

use thiserror::Error;

use crate::lifecycle::OrderStatus;

/// The primary error type used across all Brieftrack crates.
#[derive(Debug, Error)]
pub enum BriefError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat transport errors (send, edit or delete failed).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Classifier construction or transport errors outside the tagged
    /// [`ClassifyError`] path.
    #[error("classifier error: {message}")]
    Classifier {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A status change that is not in the transition table.
    #[error("invalid transition {from} -> {to}; allowed from {from}: {}", format_allowed(.allowed))]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        allowed: Vec<OrderStatus>,
    },

    /// No order with the given id.
    #[error("order {0} not found")]
    OrderNotFound(i64),

    /// Physical deletion is only permitted while an order is still a draft.
    #[error("order {id} is {status}, only drafts can be deleted")]
    OrderNotDraft { id: i64, status: OrderStatus },

    /// Processing refused because readiness blockers are present.
    #[error("not ready: {}", .blockers.join(", "))]
    NotReady { blockers: Vec<String> },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_allowed(allowed: &[OrderStatus]) -> String {
    if allowed.is_empty() {
        return "none (terminal)".to_string();
    }
    allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a single classification request.
///
/// Callers pattern-match on the kind: transient failures are worth retrying
/// later, permanent ones are recorded and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// Rate limit, connection failure, timeout, or retryable server status.
    #[error("transient classifier failure: {message}")]
    Transient { message: String },

    /// Malformed JSON, schema violation, or non-retryable API status.
    #[error("permanent classifier failure: {message}")]
    Permanent { message: String },
}

impl ClassifyError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
