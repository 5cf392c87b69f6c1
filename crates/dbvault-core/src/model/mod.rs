//! Snapshot data model
//!
//! - `LocalSnapshot`: transient consistent copy of the live database file
//! - `RemoteSnapshot`: immutable entry in the remote backup folder
//! - Outcome types returned by restore, backup cycles and sweeps

pub mod outcome;
pub mod snapshot;

pub use outcome::{CycleOutcome, DeleteOutcome, RestoreOutcome, SweepReport};
pub use snapshot::{latest, Fingerprint, LocalSnapshot, RemoteSnapshot};
