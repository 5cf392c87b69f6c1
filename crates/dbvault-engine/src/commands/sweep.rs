//! Retention Sweeper
//!
//! Deletes snapshots older than the retention window. The newest snapshot
//! in the folder is never selected, whatever its age.

use crate::schedule::{bounded, ticker};
use chrono::{DateTime, Utc};
use dbvault_core::errors::Result;
use dbvault_core::model::{DeleteOutcome, SweepReport};
use dbvault_core::select_expired;
use dbvault_core::{log_op_end, log_op_error, log_op_start};
use dbvault_core_types::schema::OP_SWEEP;
use dbvault_core_types::CycleId;
use dbvault_store::remote::SnapshotStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn SnapshotStore>,
    folder: String,
    timeout: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn SnapshotStore>, folder: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            folder: folder.into(),
            timeout,
        }
    }

    /// Delete every snapshot older than `max_age_days`
    ///
    /// # Errors
    ///
    /// Listing or bulk-delete transport failures. Individual keys the store
    /// refuses are reported in [`SweepReport::failed`] instead.
    pub async fn sweep(&self, max_age_days: u32) -> Result<SweepReport> {
        self.sweep_at(max_age_days, Utc::now()).await
    }

    /// [`RetentionSweeper::sweep`] against a fixed clock
    ///
    /// # Errors
    ///
    /// See [`RetentionSweeper::sweep`].
    pub async fn sweep_at(&self, max_age_days: u32, now: DateTime<Utc>) -> Result<SweepReport> {
        let cycle_id = CycleId::new();
        let start = Instant::now();
        log_op_start!(OP_SWEEP, cycle_id = %cycle_id, folder = %self.folder, max_age_days = max_age_days);

        let result = self.delete_expired(max_age_days, now).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(report) => {
                if !report.failed.is_empty() {
                    tracing::warn!(failed = ?report.failed, "Some expired snapshots were not deleted");
                }
                log_op_end!(
                    OP_SWEEP,
                    duration_ms = duration_ms,
                    cycle_id = %cycle_id,
                    deleted = report.deleted.len(),
                    already_gone = report.already_gone.len(),
                    failed = report.failed.len(),
                    retained = report.retained
                );
                Ok(report)
            }
            Err(err) => {
                let err = err.with_cycle_id(cycle_id.clone());
                log_op_error!(OP_SWEEP, err.clone(), duration_ms = duration_ms, cycle_id = %cycle_id);
                Err(err)
            }
        }
    }

    /// Sweep every `period` until `shutdown` turns true
    pub async fn run(self, max_age_days: u32, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    // Already logged by sweep_at
                    let _ = self.sweep(max_age_days).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Retention sweeper stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn delete_expired(&self, max_age_days: u32, now: DateTime<Utc>) -> Result<SweepReport> {
        let snapshots = bounded("list", self.timeout, self.store.list(&self.folder)).await?;
        let expired: Vec<String> = select_expired(&snapshots, max_age_days, now)
            .into_iter()
            .map(|s| s.key.clone())
            .collect();

        let mut report = SweepReport {
            retained: snapshots.len() - expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            return Ok(report);
        }

        let results = bounded("delete", self.timeout, self.store.delete_many(&expired)).await?;
        for (key, outcome) in results {
            match outcome {
                DeleteOutcome::Deleted => report.deleted.push(key),
                DeleteOutcome::NotFound => report.already_gone.push(key),
                DeleteOutcome::Failed => report.failed.push(key),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use dbvault_core::errors::ExErrorKind;
    use dbvault_store::remote::{MemoryOp, MemoryStore};

    #[tokio::test]
    async fn test_deletes_only_expired() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let old = store.insert("Backups", &b"a"[..], now - ChronoDuration::days(5)).unwrap();
        let fresh = store.insert("Backups", &b"b"[..], now - ChronoDuration::days(1)).unwrap();

        let report = RetentionSweeper::new(store.clone(), "Backups", Duration::from_secs(5))
            .sweep_at(3, now)
            .await
            .unwrap();

        assert_eq!(report.deleted, vec![old.key.clone()]);
        assert_eq!(report.retained, 1);
        assert!(report.is_clean());
        assert!(store.content(&old.key).unwrap().is_none());
        assert!(store.content(&fresh.key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_newest_survives_zero_day_retention() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert("Backups", &b"a"[..], now - ChronoDuration::days(9)).unwrap();
        let newest = store.insert("Backups", &b"b"[..], now - ChronoDuration::days(8)).unwrap();

        let report = RetentionSweeper::new(store.clone(), "Backups", Duration::from_secs(5))
            .sweep_at(0, now)
            .await
            .unwrap();

        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.retained, 1);
        assert!(store.content(&newest.key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(MemoryOp::List).unwrap();

        let err = RetentionSweeper::new(store, "Backups", Duration::from_secs(5))
            .sweep(3)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Network);
    }
}
