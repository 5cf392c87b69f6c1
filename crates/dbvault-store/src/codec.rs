//! Snapshot Codec
//!
//! Produces a transactionally consistent copy of the live database with
//! SQLite's online backup API. A plain filesystem copy taken while the
//! application writes can capture a torn page; the backup API cannot.

use crate::errors::{io_error, join_error, Result};
use crate::fs::{remove_if_exists, DatabaseFile};
use chrono::Utc;
use dbvault_core::errors::VaultError;
use dbvault_core::model::LocalSnapshot;
use rusqlite::backup::{Backup, StepResult};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_RETRIES: u32 = 50;
const BUSY_PAUSE: Duration = Duration::from_millis(20);

/// Takes snapshots of one database file into one fixed temporary path
#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    db: DatabaseFile,
    snapshot_path: PathBuf,
}

impl SnapshotCodec {
    pub fn new(db: DatabaseFile, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            snapshot_path: snapshot_path.into(),
        }
    }

    /// Copy the live database to the snapshot path
    ///
    /// Waits while a restore holds the database file exclusively.
    pub async fn take_snapshot(&self) -> Result<LocalSnapshot> {
        let _guard = self.db.shared().await;

        let source = self.db.path().to_path_buf();
        let dest = self.snapshot_path.clone();
        let size_bytes = tokio::task::spawn_blocking(move || backup_blocking(&source, &dest))
            .await
            .map_err(|e| join_error("take_snapshot", e))??;

        tracing::debug!(
            snapshot_path = %self.snapshot_path.display(),
            size_bytes,
            "Snapshot taken"
        );

        Ok(LocalSnapshot {
            path: self.snapshot_path.clone(),
            size_bytes,
            taken_at: Utc::now(),
        })
    }

    /// Remove the temporary snapshot file; absent is fine
    pub async fn discard(&self, snapshot: &LocalSnapshot) -> Result<()> {
        remove_if_exists(&snapshot.path).await.map(|_| ())
    }
}

fn backup_blocking(source: &Path, dest: &Path) -> Result<u64> {
    // A crashed cycle may have left a stale snapshot behind
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error("remove_stale_snapshot", e)),
    }

    if let Err(e) = copy_pages(source, dest) {
        let _ = std::fs::remove_file(dest);
        return Err(e);
    }

    let metadata = std::fs::metadata(dest).map_err(|e| io_error("stat_snapshot", e))?;
    Ok(metadata.len())
}

/// Copy every page of `source` into `dest` in a single backup step
fn copy_pages(source: &Path, dest: &Path) -> Result<()> {
    let failed = |reason: String| VaultError::SnapshotFailed {
        path: source.display().to_string(),
        reason,
    };

    // No CREATE flag: a missing source must fail instead of snapshotting an empty database
    let src = Connection::open_with_flags(
        source,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| failed(e.to_string()))?;
    let mut dst = Connection::open(dest).map_err(|e| failed(e.to_string()))?;

    {
        let backup = Backup::new(&src, &mut dst).map_err(|e| failed(e.to_string()))?;
        let mut retries = 0;
        loop {
            match backup.step(-1).map_err(|e| failed(e.to_string()))? {
                StepResult::Done => break,
                StepResult::Busy | StepResult::Locked if retries < BUSY_RETRIES => {
                    retries += 1;
                    std::thread::sleep(BUSY_PAUSE);
                }
                other => return Err(failed(format!("backup stopped at {:?}", other)).into()),
            }
        }
    }

    dst.close().map_err(|(_, e)| failed(e.to_string()))?;
    Ok(())
}
