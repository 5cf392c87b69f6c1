//! Local file primitives
//!
//! Provides:
//! - `AtomicFile`: streamed temp→fsync→rename replacement of a target file
//! - `remove_if_exists`: idempotent delete
//! - `DatabaseFile`: the live database path plus its exclusive/shared gate

mod atomic;
mod database_file;

pub use atomic::{remove_if_exists, temp_path_for, AtomicFile};
pub use database_file::DatabaseFile;
