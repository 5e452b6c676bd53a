// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod classifier;
pub mod notifier;
pub mod storage;

pub use adapter::PluginAdapter;
pub use classifier::Classifier;
pub use notifier::Notifier;
pub use storage::StorageAdapter;
