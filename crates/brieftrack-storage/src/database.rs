// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use brieftrack_core::BriefError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Handle to the single SQLite connection. Cheap to share behind an `Arc`.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, BriefError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BriefError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| BriefError::Storage {
                source: Box::new(e),
            })?;

        let db = Self { conn };
        db.prepare().await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Open an existing database read-only. No PRAGMAs, no migrations, and
    /// a missing file is an error rather than a new database.
    pub async fn open_read_only(path: &str) -> Result<Self, BriefError> {
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        let conn = tokio_rusqlite::Connection::open_with_flags(path, flags)
            .await
            .map_err(|e| BriefError::Storage {
                source: Box::new(e),
            })?;
        debug!(path, "database opened read-only");
        Ok(Self { conn })
    }

    async fn prepare(&self) -> Result<(), BriefError> {
        self.conn
            .call(|conn| -> Result<Result<(), BriefError>, rusqlite::Error> {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?
    }

    /// The underlying connection. Every query goes through `call()` on it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BriefError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(|e| BriefError::Storage {
            source: Box::new(e),
        })
    }
}

/// Truncating WAL checkpoint.
pub(crate) async fn checkpoint(conn: &tokio_rusqlite::Connection) -> Result<(), BriefError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
    })
    .await
    .map_err(map_tr_err)
}

/// Map a tokio-rusqlite error into the storage variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> BriefError {
    BriefError::Storage {
        source: Box::new(e),
    }
}
