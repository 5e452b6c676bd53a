// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Brieftrack integration tests.
//!
//! Mock adapters and a harness for fast, deterministic tests without a chat
//! platform or the classification API.
//!
//! # Components
//!
//! - [`MockClassifier`] - scripted classification outcomes
//! - [`RecordingNotifier`] - captures outbound operations, with failure injection
//! - [`TestHarness`] - temp database, mocks, and a ready runtime context

pub mod harness;
pub mod mock_classifier;
pub mod recording_notifier;

pub use harness::TestHarness;
pub use mock_classifier::MockClassifier;
pub use recording_notifier::{NotifierCall, RecordingNotifier};
