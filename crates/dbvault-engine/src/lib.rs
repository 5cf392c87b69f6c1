//! dbvault Engine - backup/restore orchestration
//!
//! Coordinates the pure decisions in `dbvault-core` with the I/O in
//! `dbvault-store`:
//! - Restore Orchestrator (startup, one shot)
//! - Backup Scheduler and Retention Sweeper (recurring, independent)
//! - Configuration loading
//! - Composition root that enforces restore → connect → sync → serve

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod schedule;

pub use bootstrap::{BackgroundTasks, RestoreDecision, StartupReport, Vault};
pub use commands::backup::BackupScheduler;
pub use commands::restore::RestoreOrchestrator;
pub use commands::sweep::RetentionSweeper;
pub use config::{RemoteSettings, Settings};
