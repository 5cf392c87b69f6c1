//! Migration runner
//!
//! Applies migrations with checksums and idempotency

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{get_migrations, APP_TABLES};
use rusqlite::{Connection, OptionalExtension};

/// Apply all pending migrations to the database
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    create_schema_version_table(conn)?;

    for migration in get_migrations() {
        apply_migration(conn, migration.id, migration.sql)?;
    }

    Ok(())
}

/// Ids of embedded migrations not yet recorded in `schema_version`
pub fn pending_migrations(conn: &Connection) -> Result<Vec<&'static str>> {
    create_schema_version_table(conn)?;

    let mut pending = Vec::new();
    for migration in get_migrations() {
        if recorded_checksum(conn, migration.id)?.is_none() {
            pending.push(migration.id);
        }
    }
    Ok(pending)
}

/// Drop every application table and forget their migrations
pub fn drop_app_tables(conn: &mut Connection) -> Result<()> {
    create_schema_version_table(conn)?;

    let tx = conn.transaction().map_err(from_rusqlite)?;
    for table in APP_TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))
            .map_err(from_rusqlite)?;
    }
    tx.execute("DELETE FROM schema_version", [])
        .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    Ok(())
}

/// Create the schema_version table if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

fn recorded_checksum(conn: &Connection, migration_id: &str) -> Result<Option<Option<String>>> {
    conn.query_row(
        "SELECT checksum FROM schema_version WHERE migration_id = ?",
        [migration_id],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Apply a single migration if not already applied
fn apply_migration(conn: &mut Connection, migration_id: &str, sql: &str) -> Result<()> {
    let checksum = compute_checksum(sql);

    if let Some(recorded) = recorded_checksum(conn, migration_id)? {
        return match recorded {
            Some(existing) if existing != checksum => {
                Err(checksum_mismatch(migration_id, &existing, &checksum))
            }
            _ => Ok(()),
        };
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(sql)
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        rusqlite::params![migration_id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    Ok(())
}
