// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`Database`] struct IS the single writer. Do NOT create
//! additional Connection instances for writes. Every read-modify-write that
//! spans more than one statement runs inside an explicit transaction in a
//! single `call` closure.

use tracing::debug;

use maitred_core::MaitredError;

/// Convert a tokio-rusqlite error into MaitredError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MaitredError {
    MaitredError::Storage {
        source: Box::new(e),
    }
}

/// Convert a bare rusqlite error into MaitredError::Storage.
pub fn map_sql_err(e: rusqlite::Error) -> MaitredError {
    MaitredError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection.
///
/// Cloneable handles to the underlying connection are obtained through
/// [`Database::connection`]; all of them funnel into the one background
/// thread owned by tokio-rusqlite.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at `path` with default settings.
    ///
    /// Creates parent directories, applies PRAGMAs (WAL journal, normal
    /// sync, foreign keys, busy timeout) and runs embedded migrations.
    pub async fn open(path: &str) -> Result<Self, MaitredError> {
        Self::open_with_busy_timeout(path, 5000).await
    }

    /// Open with an explicit busy timeout in milliseconds.
    pub async fn open_with_busy_timeout(
        path: &str,
        busy_timeout_ms: u32,
    ) -> Result<Self, MaitredError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MaitredError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_sql_err)?;

        let pragmas = format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        );
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(&pragmas)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<Result<(), MaitredError>, rusqlite::Error> {
            Ok(crate::migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path = %path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL into the main database file.
    ///
    /// Called on shutdown; the connection itself is closed when the last
    /// handle drops.
    pub async fn close(&self) -> Result<(), MaitredError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
