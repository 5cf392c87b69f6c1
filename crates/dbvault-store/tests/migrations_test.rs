// Integration tests for the migration framework and the relational layer

use dbvault_store::db::{RelationalLayer, SqliteDatabase, SyncOptions};
use rusqlite::Connection;
use tempfile::TempDir;

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = Connection::open_in_memory().unwrap();

    // When: Migrations are applied
    let result = dbvault_store::migrations::apply_migrations(&mut conn);

    // Then: All migrations succeed and the application tables exist
    assert!(result.is_ok(), "Migrations should succeed: {:?}", result.err());
    let tables = get_table_names(&conn);
    for expected in ["schema_version", "users", "profiles", "sqlite_sequence"] {
        assert!(
            tables.contains(&expected.to_string()),
            "Missing table: {}",
            expected
        );
    }
}

#[test]
fn test_migrations_recorded_with_checksums() {
    // Given: A migrated database
    let mut conn = Connection::open_in_memory().unwrap();
    dbvault_store::migrations::apply_migrations(&mut conn).unwrap();

    // Then: Every migration is recorded once with a SHA256 checksum
    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM schema_version ORDER BY id")
        .unwrap();
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(
        rows.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        dbvault_store::migrations::migration_ids()
    );
    assert!(rows.iter().all(|(_, checksum)| checksum.len() == 64));
}

#[test]
fn test_data_survives_reconnect_and_resync() {
    // Given: A synced file database with one user
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.sqlite");
    {
        let mut db = SqliteDatabase::new(&path);
        db.connect().unwrap();
        db.sync(SyncOptions::default()).unwrap();
        db.connection()
            .unwrap()
            .execute(
                "INSERT INTO users (email, password_hash, created_at, updated_at) VALUES ('a@b.c', 'h', 1, 1)",
                [],
            )
            .unwrap();
        db.close().unwrap();
    }

    // When: The process restarts and syncs without force
    let mut db = SqliteDatabase::new(&path);
    db.connect().unwrap();
    db.sync(SyncOptions::default()).unwrap();

    // Then: The row is still there
    let count: i64 = db
        .connection()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_connect_rejects_non_database_file() {
    // Given: A file that is not a SQLite database
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.sqlite");
    std::fs::write(&path, vec![0x42u8; 8192]).unwrap();

    // When: The relational layer connects
    let mut db = SqliteDatabase::new(&path);
    let result = db.connect();

    // Then: Connection fails with a persistence error
    let err = result.unwrap_err();
    assert_eq!(err.code(), "ERR_PERSISTENCE");
    assert!(!db.is_connected());
}
