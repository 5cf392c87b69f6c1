//! Error handling for dbvault-store
//!
//! Wraps dbvault-core ExError with store-specific helpers

use dbvault_core::errors::{ExError, ExErrorKind, VaultError};

pub use dbvault_core::errors::io_error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Schema)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Schema)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Map a reqwest failure to a network or timeout error
pub fn from_reqwest(op: &str, err: reqwest::Error) -> ExError {
    if err.is_timeout() {
        return ExError::new(ExErrorKind::Timeout)
            .with_op(op.to_string())
            .with_message(err.to_string());
    }
    VaultError::Transport {
        op: op.to_string(),
        reason: err.to_string(),
    }
    .into()
}

/// Error for a lock poisoned by a panicking holder
pub fn poisoned(what: &str) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("lock")
        .with_message(format!("{} lock poisoned", what))
}

/// Error for a blocking task that panicked or was cancelled
pub fn join_error(op: &str, err: tokio::task::JoinError) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op(op.to_string())
        .with_message(err.to_string())
}
