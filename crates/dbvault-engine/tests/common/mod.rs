// Shared fixtures for engine integration tests

#![allow(dead_code)]

use dbvault_core::errors::Result;
use dbvault_core::logging_facility::Profile;
use dbvault_core_types::Sensitive;
use dbvault_engine::config::{RemoteSettings, Settings};
use dbvault_store::db::{RelationalLayer, SyncOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const FOLDER: &str = "Backups";

pub fn settings(dir: &Path) -> Settings {
    Settings {
        database_path: dir.join("database.sqlite"),
        snapshot_path: dir.join("backup-database.sqlite"),
        backup_folder: FOLDER.to_string(),
        backup_interval_secs: 3600,
        sweep_interval_secs: 86_400,
        retention_days: 3,
        remote_timeout_secs: 5,
        log_profile: Profile::Test,
        remote: RemoteSettings {
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: Sensitive::new("secret".to_string()),
        },
    }
}

/// Bytes of a one-page SQLite database (4096 bytes)
pub fn one_page_database(scratch: &Path) -> Vec<u8> {
    let path = scratch.join("seed.sqlite");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA page_size = 4096; PRAGMA user_version = 7;")
        .unwrap();
    drop(conn);
    std::fs::read(&path).unwrap()
}

/// What a `RelationalLayer` call observed
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Database file content at the moment `connect` ran
    Connect { file: Option<Vec<u8>>, temp_present: bool },
    Sync(SyncOptions),
}

/// Relational layer that records calls instead of opening a connection
pub struct RecordingLayer {
    path: PathBuf,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl RelationalLayer for RecordingLayer {
    fn connect(&mut self) -> Result<()> {
        let temp = dbvault_store::fs::temp_path_for(&self.path);
        self.calls.lock().unwrap().push(Call::Connect {
            file: std::fs::read(&self.path).ok(),
            temp_present: temp.exists(),
        });
        Ok(())
    }

    fn sync(&mut self, options: SyncOptions) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Sync(options));
        Ok(())
    }
}
