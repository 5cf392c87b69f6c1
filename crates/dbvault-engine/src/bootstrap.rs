//! Composition root
//!
//! Builds every engine component from one `Settings` value and enforces the
//! startup order: restore, then connect, then schema sync, and only then the
//! recurring tasks.

use crate::commands::backup::BackupScheduler;
use crate::commands::restore::RestoreOrchestrator;
use crate::commands::sweep::RetentionSweeper;
use crate::config::Settings;
use dbvault_core::errors::{ExError, Result};
use dbvault_core::model::RestoreOutcome;
use dbvault_core::{log_op_end, log_op_error, log_op_start};
use dbvault_core_types::schema::OP_BOOTSTRAP;
use dbvault_store::codec::SnapshotCodec;
use dbvault_store::db::{RelationalLayer, SyncOptions};
use dbvault_store::errors::join_error;
use dbvault_store::fs::DatabaseFile;
use dbvault_store::remote::{CloudinaryStore, SnapshotStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What startup did with the local database file
#[derive(Debug, Clone)]
pub enum RestoreDecision {
    /// Local file replaced by this snapshot
    Restored { key: String, size_bytes: u64 },
    /// Folder empty; starting from whatever is on disk
    NoBackup,
    /// Restore failed; starting from whatever is on disk
    FreshStart { error: ExError },
}

#[derive(Debug, Clone)]
pub struct StartupReport {
    pub restore: RestoreDecision,
}

/// Handles of the recurring tasks
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Signal both loops to stop and wait for them
    ///
    /// A backup cycle in progress is allowed to finish.
    ///
    /// # Errors
    ///
    /// `ERR_INTERNAL` if a loop panicked.
    pub async fn shutdown(self) -> Result<()> {
        // Receivers only vanish once the loops have already exited
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            handle.await.map_err(|e| join_error("shutdown", e))?;
        }
        tracing::info!("Background tasks stopped");
        Ok(())
    }
}

pub struct Vault {
    db: DatabaseFile,
    store: Arc<dyn SnapshotStore>,
    restorer: RestoreOrchestrator,
    backup: BackupScheduler,
    sweeper: RetentionSweeper,
    backup_interval: Duration,
    sweep_interval: Duration,
    retention_days: u32,
}

impl Vault {
    /// Wire the engine against an arbitrary snapshot store
    pub fn new(settings: &Settings, store: Arc<dyn SnapshotStore>) -> Self {
        let db = DatabaseFile::new(&settings.database_path);
        let timeout = settings.remote_timeout();
        let folder = settings.backup_folder.clone();

        let restorer = RestoreOrchestrator::new(store.clone(), db.clone(), folder.clone(), timeout);
        let codec = SnapshotCodec::new(db.clone(), &settings.snapshot_path);
        let backup = BackupScheduler::new(codec, store.clone(), folder.clone(), timeout);
        let sweeper = RetentionSweeper::new(store.clone(), folder, timeout);

        Self {
            db,
            store,
            restorer,
            backup,
            sweeper,
            backup_interval: settings.backup_interval(),
            sweep_interval: settings.sweep_interval(),
            retention_days: settings.retention_days,
        }
    }

    /// Wire the engine against Cloudinary using the configured credentials
    ///
    /// # Errors
    ///
    /// `ERR_NETWORK` if the HTTP client cannot be built.
    pub fn with_cloudinary(settings: &Settings) -> Result<Self> {
        let store = CloudinaryStore::new(settings.cloudinary_credentials(), settings.remote_timeout())?;
        Ok(Self::new(settings, Arc::new(store)))
    }

    pub fn database_file(&self) -> &DatabaseFile {
        &self.db
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn restorer(&self) -> &RestoreOrchestrator {
        &self.restorer
    }

    pub fn backup(&self) -> &BackupScheduler {
        &self.backup
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Restore the latest snapshot, then connect and sync the schema
    ///
    /// A failed restore is logged and startup continues with whatever file
    /// is on disk. `connect` is not called until the restore has settled.
    ///
    /// # Errors
    ///
    /// Connection and schema failures from `relational`; the process cannot
    /// serve without them.
    pub async fn init_database<R>(&self, relational: &mut R) -> Result<StartupReport>
    where
        R: RelationalLayer + ?Sized,
    {
        let start = Instant::now();
        log_op_start!(OP_BOOTSTRAP, path = %self.db.path().display());

        let restore = match self.restorer.restore().await {
            Ok(RestoreOutcome::Restored { key, size_bytes }) => {
                RestoreDecision::Restored { key, size_bytes }
            }
            Ok(RestoreOutcome::NotFound) => {
                tracing::info!("No backup to restore, starting with a fresh database");
                RestoreDecision::NoBackup
            }
            Err(error) => {
                tracing::warn!(error = %error, "Backup restoration failed, starting with a fresh database");
                RestoreDecision::FreshStart { error }
            }
        };

        let synced = relational.connect().and_then(|()| {
            relational.sync(SyncOptions {
                force: false,
                alter: true,
            })
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        match synced {
            Ok(()) => {
                log_op_end!(OP_BOOTSTRAP, duration_ms = duration_ms, restore = ?restore);
                Ok(StartupReport { restore })
            }
            Err(err) => {
                log_op_error!(OP_BOOTSTRAP, err.clone(), duration_ms = duration_ms);
                Err(err)
            }
        }
    }

    /// Start the backup and retention loops on the current runtime
    pub fn spawn_background(&self) -> BackgroundTasks {
        let (shutdown, rx) = watch::channel(false);

        let backup = self.backup.clone();
        let backup_every = self.backup_interval;
        let backup_rx = rx.clone();
        let backup_handle = tokio::spawn(async move { backup.run(backup_every, backup_rx).await });

        let sweeper = self.sweeper.clone();
        let sweep_every = self.sweep_interval;
        let days = self.retention_days;
        let sweep_handle = tokio::spawn(async move { sweeper.run(days, sweep_every, rx).await });

        tracing::info!(
            backup_interval_secs = backup_every.as_secs(),
            sweep_interval_secs = sweep_every.as_secs(),
            retention_days = days,
            "Background tasks started"
        );

        BackgroundTasks {
            shutdown,
            handles: vec![backup_handle, sweep_handle],
        }
    }
}
