// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::BriefError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of the persistence backend. Queries themselves go through the
/// repository functions of the storage crate.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies migrations.
    async fn initialize(&self) -> Result<(), BriefError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), BriefError>;
}
