//! Backup Scheduler
//!
//! One cycle: snapshot the live file, compare it against the newest remote
//! snapshot, upload when it differs, and always discard the local copy.
//! Cycles never overlap; a tick that arrives while one is running is
//! skipped.

use crate::schedule::{bounded, ticker};
use dbvault_core::errors::Result;
use dbvault_core::model::{CycleOutcome, LocalSnapshot};
use dbvault_core::should_upload;
use dbvault_core::{log_op_end, log_op_error, log_op_start};
use dbvault_core_types::schema::OP_BACKUP_CYCLE;
use dbvault_core_types::CycleId;
use dbvault_store::codec::SnapshotCodec;
use dbvault_store::remote::SnapshotStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

#[derive(Clone)]
pub struct BackupScheduler {
    codec: SnapshotCodec,
    store: Arc<dyn SnapshotStore>,
    folder: String,
    timeout: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl BackupScheduler {
    pub fn new(
        codec: SnapshotCodec,
        store: Arc<dyn SnapshotStore>,
        folder: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            folder: folder.into(),
            timeout,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Run one backup cycle now
    ///
    /// Returns `Skipped` without doing anything when another cycle on this
    /// scheduler (or a clone of it) is still running.
    ///
    /// # Errors
    ///
    /// Snapshot, list and upload failures. The local snapshot file is removed
    /// in every case.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(_permit) = self.in_flight.try_lock() else {
            tracing::warn!("Previous backup cycle still running, skipping this tick");
            return Ok(CycleOutcome::Skipped);
        };

        let cycle_id = CycleId::new();
        let start = Instant::now();
        log_op_start!(OP_BACKUP_CYCLE, cycle_id = %cycle_id, folder = %self.folder);

        let result = self.snapshot_and_compare().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                match &outcome {
                    CycleOutcome::Uploaded(remote) => {
                        tracing::info!(snapshot_key = %remote.key, "Backup uploaded");
                        log_op_end!(
                            OP_BACKUP_CYCLE,
                            duration_ms = duration_ms,
                            cycle_id = %cycle_id,
                            outcome = "uploaded",
                            snapshot_key = %remote.key,
                            size_bytes = remote.size_bytes
                        );
                    }
                    CycleOutcome::Unchanged { size_bytes } => {
                        tracing::info!("No changes detected. Backup not created.");
                        log_op_end!(
                            OP_BACKUP_CYCLE,
                            duration_ms = duration_ms,
                            cycle_id = %cycle_id,
                            outcome = "unchanged",
                            size_bytes = *size_bytes
                        );
                    }
                    CycleOutcome::Skipped => {}
                }
                Ok(outcome)
            }
            Err(err) => {
                let err = err.with_cycle_id(cycle_id.clone());
                log_op_error!(
                    OP_BACKUP_CYCLE,
                    err.clone(),
                    duration_ms = duration_ms,
                    cycle_id = %cycle_id
                );
                Err(err)
            }
        }
    }

    /// Tick every `period` until `shutdown` turns true
    ///
    /// The first cycle runs one period after start. Cycle errors are logged
    /// and the loop carries on; a cycle in progress when shutdown arrives is
    /// finished first.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        if err.kind().is_transient() {
                            tracing::warn!(error = %err, "Backup cycle failed, retrying next tick");
                        } else {
                            tracing::error!(error = %err, "Backup cycle abandoned");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Backup scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn snapshot_and_compare(&self) -> Result<CycleOutcome> {
        let snapshot = self.codec.take_snapshot().await?;
        let result = self.upload_if_changed(&snapshot).await;
        if let Err(err) = self.codec.discard(&snapshot).await {
            tracing::warn!(error = %err, "Could not remove local snapshot");
        }
        result
    }

    async fn upload_if_changed(&self, snapshot: &LocalSnapshot) -> Result<CycleOutcome> {
        let latest = bounded("list", self.timeout, self.store.latest(&self.folder)).await?;
        if !should_upload(snapshot, latest.as_ref()) {
            return Ok(CycleOutcome::Unchanged {
                size_bytes: snapshot.size_bytes,
            });
        }
        let uploaded = bounded(
            "upload",
            self.timeout,
            self.store.upload(&snapshot.path, &self.folder),
        )
        .await?;
        Ok(CycleOutcome::Uploaded(uploaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbvault_core::errors::ExErrorKind;
    use dbvault_store::fs::DatabaseFile;
    use dbvault_store::remote::{MemoryOp, MemoryStore};
    use std::path::Path;

    fn seed_db(path: &Path, rows: usize) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE IF NOT EXISTS t (v TEXT)").unwrap();
        for i in 0..rows {
            conn.execute("INSERT INTO t (v) VALUES (?1)", [format!("row-{i:05}-{}", "x".repeat(64))])
                .unwrap();
        }
    }

    fn scheduler(dir: &Path, store: Arc<MemoryStore>) -> BackupScheduler {
        let db = DatabaseFile::new(dir.join("database.sqlite"));
        let codec = SnapshotCodec::new(db, dir.join("backup-database.sqlite"));
        BackupScheduler::new(codec, store, "Backups", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_cycle_uploads_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        seed_db(&dir.path().join("database.sqlite"), 10);
        let store = Arc::new(MemoryStore::new());
        let s = scheduler(dir.path(), store.clone());

        let first = s.run_cycle().await.unwrap();
        let second = s.run_cycle().await.unwrap();

        assert!(matches!(first, CycleOutcome::Uploaded(_)));
        assert!(matches!(second, CycleOutcome::Unchanged { .. }));
        assert_eq!(store.upload_count().unwrap(), 1);
        assert!(!dir.path().join("backup-database.sqlite").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_discards_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        seed_db(&dir.path().join("database.sqlite"), 1);
        let store = Arc::new(MemoryStore::new());
        store.fail_next(MemoryOp::Upload).unwrap();
        let s = scheduler(dir.path(), store.clone());

        let err = s.run_cycle().await.unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Network);
        assert!(!dir.path().join("backup-database.sqlite").exists());
        assert_eq!(store.upload_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_database_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());

        let err = scheduler(dir.path(), store).run_cycle().await.unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Io);
    }
}
