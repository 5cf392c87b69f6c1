//! dbvault Store - every piece of I/O the engine touches
//!
//! Provides:
//! - SQLite relational layer with an embedded migrations framework
//! - Snapshot Codec built on SQLite's online backup API
//! - Atomic file replace primitive and the database file gate
//! - Remote Snapshot Store trait with Cloudinary and in-memory implementations

pub mod codec;
pub mod db;
pub mod errors;
pub mod fs;
pub mod migrations;
pub mod remote;

// Re-export key types
pub use codec::SnapshotCodec;
pub use db::{RelationalLayer, SqliteDatabase, SyncOptions};
pub use errors::Result;
pub use fs::{AtomicFile, DatabaseFile};
pub use remote::{ByteStream, SnapshotStore};
