// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order lifecycle: the fixed status set, its transition table, and the
//! lifecycle timestamps derived from the status being entered.
//!
//! ```text
//! draft -> awaiting_confirmation -> processing -> finished -> delivered
//!   \______________\____________________\
//!                                        -> cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::BriefError;

/// Lifecycle status of an order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    AwaitingConfirmation,
    Processing,
    Finished,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Targets reachable from `self` through a normal transition.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Draft => &[AwaitingConfirmation, Cancelled],
            AwaitingConfirmation => &[Processing, Cancelled],
            Processing => &[Finished, Cancelled],
            Finished => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    /// The status one step back along the main line, for manual correction.
    /// Drafts and cancelled orders have none.
    pub fn previous(self) -> Option<OrderStatus> {
        use OrderStatus::*;
        match self {
            AwaitingConfirmation => Some(Draft),
            Processing => Some(AwaitingConfirmation),
            Finished => Some(Processing),
            Delivered => Some(Finished),
            Draft | Cancelled => None,
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.allowed_targets().contains(&to)
    }

    /// Statuses whose deadline can still be overdue (work not yet shot).
    pub fn counts_towards_overdue(self) -> bool {
        matches!(
            self,
            OrderStatus::Draft | OrderStatus::AwaitingConfirmation | OrderStatus::Processing
        )
    }

    /// Quick postpone is offered only while the work is pending or underway.
    pub fn allows_postpone(self) -> bool {
        matches!(
            self,
            OrderStatus::AwaitingConfirmation | OrderStatus::Processing
        )
    }

    pub fn icon(self) -> &'static str {
        match self {
            OrderStatus::Draft => "📋",
            OrderStatus::AwaitingConfirmation => "📦",
            OrderStatus::Processing => "🎬",
            OrderStatus::Finished => "📹",
            OrderStatus::Delivered => "✔️",
            OrderStatus::Cancelled => "🗑",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::AwaitingConfirmation => "AWAITING MODEL",
            OrderStatus::Processing => "IN PROGRESS",
            OrderStatus::Finished => "SHOT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Check a normal transition against the table.
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), BriefError> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    Err(BriefError::InvalidTransition {
        from,
        to,
        allowed: from.allowed_targets().to_vec(),
    })
}

/// Urgency of an order. Defaults to `medium`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn icon(self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🔴",
        }
    }
}

/// Sales platform the order came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Fansly,
    Onlyfans,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::Fansly => "Fansly",
            Platform::Onlyfans => "OnlyFans",
        }
    }
}

/// `finished_at` / `delivered_at` pair. Only ever recomputed through
/// [`LifecycleStamps::entering`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStamps {
    pub finished_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl LifecycleStamps {
    /// Stamps after entering `to` at `now`.
    ///
    /// - `finished`: keep or set `finished_at`, clear `delivered_at`
    /// - `delivered`: keep or set both
    /// - anything else: clear both
    pub fn entering(self, to: OrderStatus, now: DateTime<Utc>) -> Self {
        match to {
            OrderStatus::Finished => Self {
                finished_at: Some(self.finished_at.unwrap_or(now)),
                delivered_at: None,
            },
            OrderStatus::Delivered => Self {
                finished_at: Some(self.finished_at.unwrap_or(now)),
                delivered_at: Some(self.delivered_at.unwrap_or(now)),
            },
            _ => Self::default(),
        }
    }
}

/// How a status-log row came to be written.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Order creation (`from_status` is null).
    Created,
    /// Transition validated against the table.
    Transition,
    /// Manual correction bypassing the table.
    Forced,
    /// Same-status note (deadline or priority change).
    Note,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        proptest::sample::select(OrderStatus::iter().collect::<Vec<_>>())
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use OrderStatus::*;
        assert!(Draft.can_transition_to(AwaitingConfirmation));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(AwaitingConfirmation.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Finished));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Finished.can_transition_to(Delivered));
        assert!(!Finished.can_transition_to(Cancelled));
        assert!(!Processing.can_transition_to(AwaitingConfirmation));
        assert!(Delivered.allowed_targets().is_empty());
        assert!(Cancelled.allowed_targets().is_empty());
    }

    #[test]
    fn previous_steps_back_along_the_main_line() {
        use OrderStatus::*;
        assert_eq!(Delivered.previous(), Some(Finished));
        assert_eq!(AwaitingConfirmation.previous(), Some(Draft));
        assert_eq!(Draft.previous(), None);
        assert_eq!(Cancelled.previous(), None);
    }

    proptest! {
        #[test]
        fn previous_undoes_a_forward_step(status in any_status()) {
            if let Some(back) = status.previous() {
                prop_assert!(back.can_transition_to(status));
            }
        }
    }

    #[test]
    fn status_strings_are_snake_case() {
        assert_eq!(
            OrderStatus::AwaitingConfirmation.to_string(),
            "awaiting_confirmation"
        );
        assert_eq!(
            OrderStatus::from_str("processing").unwrap(),
            OrderStatus::Processing
        );
        assert!(OrderStatus::from_str("shipped").is_err());
        assert_eq!(Platform::from_str("onlyfans").unwrap(), Platform::Onlyfans);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn invalid_transition_reports_allowed_set() {
        let err = validate_transition(OrderStatus::Processing, OrderStatus::AwaitingConfirmation)
            .unwrap_err();
        match err {
            BriefError::InvalidTransition { from, to, allowed } => {
                assert_eq!(from, OrderStatus::Processing);
                assert_eq!(to, OrderStatus::AwaitingConfirmation);
                assert_eq!(allowed, vec![OrderStatus::Finished, OrderStatus::Cancelled]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn terminal_error_message_mentions_terminal() {
        let err = validate_transition(OrderStatus::Delivered, OrderStatus::Draft).unwrap_err();
        assert!(err.to_string().contains("terminal"));
    }

    #[test]
    fn finished_then_delivered_orders_stamps() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(30);
        let finished = LifecycleStamps::default().entering(OrderStatus::Finished, t0);
        assert_eq!(finished.finished_at, Some(t0));
        assert_eq!(finished.delivered_at, None);

        let delivered = finished.entering(OrderStatus::Delivered, t1);
        assert_eq!(delivered.finished_at, Some(t0));
        assert_eq!(delivered.delivered_at, Some(t1));
    }

    #[test]
    fn leaving_finished_clears_stamps() {
        let now = Utc::now();
        let stamps = LifecycleStamps::default()
            .entering(OrderStatus::Finished, now)
            .entering(OrderStatus::Delivered, now);
        assert_eq!(
            stamps.entering(OrderStatus::Processing, now),
            LifecycleStamps::default()
        );
    }

    #[test]
    fn delivered_directly_sets_both() {
        let now = Utc::now();
        let stamps = LifecycleStamps::default().entering(OrderStatus::Delivered, now);
        assert_eq!(stamps.finished_at, Some(now));
        assert_eq!(stamps.delivered_at, Some(now));
    }

    proptest! {
        #[test]
        fn validation_agrees_with_table(from in any_status(), to in any_status()) {
            let listed = from.allowed_targets().contains(&to);
            prop_assert_eq!(validate_transition(from, to).is_ok(), listed);
        }

        #[test]
        fn stamps_never_invert(path in proptest::collection::vec(any_status(), 1..12)) {
            let mut now = Utc::now();
            let mut stamps = LifecycleStamps::default();
            for to in path {
                now += Duration::seconds(7);
                stamps = stamps.entering(to, now);
                if let (Some(f), Some(d)) = (stamps.finished_at, stamps.delivered_at) {
                    prop_assert!(f <= d);
                }
                if stamps.delivered_at.is_some() {
                    prop_assert!(stamps.finished_at.is_some());
                }
            }
        }
    }
}
