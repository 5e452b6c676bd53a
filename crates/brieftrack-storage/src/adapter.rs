// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use brieftrack_config::model::StorageConfig;
use brieftrack_core::{AdapterType, BriefError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, checkpoint, map_tr_err};

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; the
/// query modules take the [`Database`] returned by [`SqliteStorage::database`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The open database, or an error if [`StorageAdapter::initialize`] has
    /// not run yet.
    pub fn database(&self) -> Result<&Database, BriefError> {
        self.db.get().ok_or_else(|| BriefError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BriefError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BriefError> {
        if let Some(db) = self.db.get() {
            checkpoint(db.connection()).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), BriefError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| BriefError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BriefError> {
        checkpoint(self.database()?.connection()).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
