//! Engine operations
//!
//! Each operation brackets its work with `log_op_start!`/`log_op_end!` and a
//! fresh `CycleId`, and bounds every remote call with the configured timeout.

pub mod backup;
pub mod restore;
pub mod sweep;
