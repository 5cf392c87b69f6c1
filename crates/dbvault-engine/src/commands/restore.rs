//! Restore Orchestrator
//!
//! Replaces the local database file with the newest remote snapshot. The
//! download lands in a temporary sibling first; the live path is only
//! touched once every byte has arrived, so a broken transfer leaves the
//! previous file in place.

use crate::schedule::bounded;
use dbvault_core::errors::{Result, VaultError};
use dbvault_core::model::{RemoteSnapshot, RestoreOutcome};
use dbvault_core::{log_op_end, log_op_error, log_op_start};
use dbvault_core_types::schema::OP_RESTORE;
use dbvault_core_types::CycleId;
use dbvault_store::fs::{remove_if_exists, AtomicFile, DatabaseFile};
use dbvault_store::remote::SnapshotStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct RestoreOrchestrator {
    store: Arc<dyn SnapshotStore>,
    db: DatabaseFile,
    folder: String,
    timeout: Duration,
}

impl RestoreOrchestrator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        db: DatabaseFile,
        folder: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            db,
            folder: folder.into(),
            timeout,
        }
    }

    /// Replace the local database with the latest snapshot, if any
    ///
    /// Holds the database file's exclusive gate from download start to the
    /// final rename, so no snapshot is taken of a half-replaced file.
    ///
    /// # Errors
    ///
    /// - `ERR_NETWORK` / `ERR_TIMEOUT` when listing or downloading fails; the
    ///   existing file is untouched
    /// - `ERR_IO` when the file system refuses the replacement
    pub async fn restore(&self) -> Result<RestoreOutcome> {
        let cycle_id = CycleId::new();
        let start = Instant::now();
        log_op_start!(OP_RESTORE, cycle_id = %cycle_id, folder = %self.folder);

        let result = self.restore_latest().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                match &outcome {
                    RestoreOutcome::Restored { key, size_bytes } => {
                        log_op_end!(
                            OP_RESTORE,
                            duration_ms = duration_ms,
                            cycle_id = %cycle_id,
                            snapshot_key = %key,
                            size_bytes = *size_bytes
                        );
                    }
                    RestoreOutcome::NotFound => {
                        tracing::info!(cycle_id = %cycle_id, "No backup found");
                        log_op_end!(
                            OP_RESTORE,
                            duration_ms = duration_ms,
                            cycle_id = %cycle_id,
                            outcome = "not_found"
                        );
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                let err = err.with_cycle_id(cycle_id.clone());
                log_op_error!(
                    OP_RESTORE,
                    err.clone(),
                    duration_ms = duration_ms,
                    cycle_id = %cycle_id
                );
                Err(err)
            }
        }
    }

    async fn restore_latest(&self) -> Result<RestoreOutcome> {
        let latest = bounded("list", self.timeout, self.store.latest(&self.folder)).await?;
        let Some(snapshot) = latest else {
            return Ok(RestoreOutcome::NotFound);
        };

        let _gate = self.db.exclusive().await;

        // Dropping `staged` on any early return removes the temporary file
        let mut staged = AtomicFile::create(self.db.path()).await?;
        bounded(
            "download",
            self.timeout,
            self.download_into(&snapshot, &mut staged),
        )
        .await?;

        if staged.bytes_written() != snapshot.size_bytes {
            return Err(VaultError::SizeMismatch {
                key: snapshot.key.clone(),
                expected: snapshot.size_bytes,
                actual: staged.bytes_written(),
            }
            .into());
        }

        remove_if_exists(self.db.path()).await?;
        for sidecar in self.db.sidecar_paths() {
            if remove_if_exists(&sidecar).await? {
                tracing::debug!(path = %sidecar.display(), "Removed stale sidecar");
            }
        }

        let size_bytes = staged.commit().await?;
        Ok(RestoreOutcome::Restored {
            key: snapshot.key,
            size_bytes,
        })
    }

    async fn download_into(&self, snapshot: &RemoteSnapshot, staged: &mut AtomicFile) -> Result<()> {
        let mut stream = self.store.open_download(snapshot).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            staged.write_chunk(&chunk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use dbvault_core::errors::ExErrorKind;
    use dbvault_store::remote::{MemoryOp, MemoryStore};

    fn orchestrator(store: Arc<MemoryStore>, path: &std::path::Path) -> RestoreOrchestrator {
        RestoreOrchestrator::new(store, DatabaseFile::new(path), "Backups", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("database.sqlite");
        let store = Arc::new(MemoryStore::new());

        let outcome = orchestrator(store, &db_path).restore().await.unwrap();

        assert_eq!(outcome, RestoreOutcome::NotFound);
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_picks_newest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("database.sqlite");
        let store = Arc::new(MemoryStore::with_chunk_size(3));
        let now = Utc::now();
        store.insert("Backups", &b"older"[..], now - ChronoDuration::hours(2)).unwrap();
        let newest = store.insert("Backups", &b"newest!"[..], now).unwrap();
        store.insert("Elsewhere", &b"other folder"[..], now + ChronoDuration::hours(1)).unwrap();

        let outcome = orchestrator(store, &db_path).restore().await.unwrap();

        assert_eq!(
            outcome,
            RestoreOutcome::Restored {
                key: newest.key,
                size_bytes: 7
            }
        );
        assert_eq!(std::fs::read(&db_path).unwrap(), b"newest!");
    }

    #[tokio::test]
    async fn test_list_failure_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("database.sqlite");
        std::fs::write(&db_path, b"current").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("Backups", &b"remote"[..], Utc::now()).unwrap();
        store.fail_next(MemoryOp::List).unwrap();

        let err = orchestrator(store, &db_path).restore().await.unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Network);
        assert!(err.cycle_id().is_some());
        assert_eq!(std::fs::read(&db_path).unwrap(), b"current");
    }

    #[tokio::test]
    async fn test_sidecars_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("database.sqlite");
        let wal = dir.path().join("database.sqlite-wal");
        let shm = dir.path().join("database.sqlite-shm");
        std::fs::write(&db_path, b"old").unwrap();
        std::fs::write(&wal, b"stale wal").unwrap();
        std::fs::write(&shm, b"stale shm").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("Backups", &b"fresh"[..], Utc::now()).unwrap();

        orchestrator(store, &db_path).restore().await.unwrap();

        assert_eq!(std::fs::read(&db_path).unwrap(), b"fresh");
        assert!(!wal.exists());
        assert!(!shm.exists());
    }
}
