//! The live database file and its access gate
//!
//! The restore holds the exclusive side while it replaces the file; the
//! snapshot codec holds the shared side while it reads it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// SQLite sidecar suffixes that belong to a database file
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Handle to the single local database file
#[derive(Debug, Clone)]
pub struct DatabaseFile {
    path: PathBuf,
    gate: Arc<RwLock<()>>,
}

impl DatabaseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared access for readers of the file
    pub async fn shared(&self) -> OwnedRwLockReadGuard<()> {
        self.gate.clone().read_owned().await
    }

    /// Exclusive access for the replace window
    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    /// Paths of the WAL, shared-memory and rollback journal files
    pub fn sidecar_paths(&self) -> Vec<PathBuf> {
        SIDECAR_SUFFIXES
            .iter()
            .map(|suffix| {
                let mut name = self
                    .path
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                name.push(suffix);
                self.path.with_file_name(name)
            })
            .collect()
    }
}
