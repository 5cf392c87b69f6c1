//! Relational layer
//!
//! Owns the application's SQLite connection. It is created by the
//! composition root after the restore has settled and closed on shutdown.

use crate::errors::{from_rusqlite, Result};
use crate::migrations::{apply_migrations, drop_app_tables, migration_ids, pending_migrations};
use dbvault_core::errors::{ExError, VaultError};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// How `sync` reconciles the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop the application tables before recreating them
    pub force: bool,
    /// Allow pending migrations to alter an already initialised schema
    pub alter: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            alter: true,
        }
    }
}

/// Interface the engine needs from the ORM/relational layer
pub trait RelationalLayer: Send {
    /// Open and authenticate the connection to the local database file
    fn connect(&mut self) -> Result<()>;

    /// Bring the schema up to date
    fn sync(&mut self, options: SyncOptions) -> Result<()>;
}

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Configure a connection with the application's settings
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON")
        .map_err(from_rusqlite)?;

    // WAL keeps readers unblocked while the codec runs its online backup
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .map_err(from_rusqlite)?;

    Ok(())
}

/// SQLite-backed relational layer
pub struct SqliteDatabase {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Live connection, once `connect` has succeeded
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection, checkpointing the WAL into the main file
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| from_rusqlite(e))?;
            tracing::debug!(path = %self.path.display(), "Closed database connection");
        }
        Ok(())
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or_else(|| {
            ExError::from(VaultError::SchemaSync {
                reason: "sync called before connect".to_string(),
            })
        })
    }
}

impl RelationalLayer for SqliteDatabase {
    fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let connection_failed = |e: ExError| -> ExError {
            VaultError::Connection {
                reason: e.message().to_string(),
            }
            .into()
        };

        let conn = open(&self.path).map_err(connection_failed)?;
        configure(&conn).map_err(connection_failed)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| connection_failed(from_rusqlite(e)))?;

        tracing::info!(path = %self.path.display(), "Database connection established");
        self.conn = Some(conn);
        Ok(())
    }

    fn sync(&mut self, options: SyncOptions) -> Result<()> {
        let conn = self.connection_mut()?;
        let schema_failed = |e: ExError| -> ExError {
            VaultError::SchemaSync {
                reason: e.to_string(),
            }
            .into()
        };

        if options.force {
            drop_app_tables(conn).map_err(schema_failed)?;
        }

        let pending = pending_migrations(conn).map_err(schema_failed)?;
        let initialised = pending.len() < migration_ids().len();
        if !options.alter && initialised && !pending.is_empty() {
            return Err(VaultError::SchemaSync {
                reason: format!(
                    "schema requires {} pending migration(s) but alter is disabled",
                    pending.len()
                ),
            }
            .into());
        }

        apply_migrations(conn).map_err(schema_failed)?;
        tracing::info!(applied = pending.len(), "Database synced");
        Ok(())
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close database connection");
        }
    }
}
