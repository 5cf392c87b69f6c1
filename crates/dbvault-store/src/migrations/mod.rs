//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums and tamper detection
//! - Idempotent application
//! - Embedded SQL migrations for the application tables

mod checksums;
mod embedded;
mod runner;

pub use embedded::{migration_ids, APP_TABLES};
pub use runner::{apply_migrations, drop_app_tables, pending_migrations};
