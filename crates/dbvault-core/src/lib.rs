//! dbvault Core - pure decision logic for the backup/restore engine
//!
//! This crate provides the I/O-free parts of the engine:
//! - Error facility (`ExError`, `ExErrorKind`, `VaultError`)
//! - Structured logging facility and macros
//! - Snapshot data model and outcome types
//! - Change detection (size heuristic)
//! - Retention window selection

pub mod detector;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod retention;

// Re-export commonly used types
pub use detector::should_upload;
pub use errors::{ExError, ExErrorKind, Result, VaultError};
pub use model::{
    CycleOutcome, DeleteOutcome, Fingerprint, LocalSnapshot, RemoteSnapshot, RestoreOutcome,
    SweepReport,
};
pub use retention::select_expired;
