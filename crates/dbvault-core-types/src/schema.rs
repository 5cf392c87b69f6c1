//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_CYCLE_ID: &str = "cycle_id";

// Snapshot identifiers
pub const FIELD_SNAPSHOT_KEY: &str = "snapshot_key";
pub const FIELD_SIZE_BYTES: &str = "size_bytes";
pub const FIELD_FOLDER: &str = "folder";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Canonical operation names
pub const OP_RESTORE: &str = "restore";
pub const OP_BACKUP_CYCLE: &str = "backup_cycle";
pub const OP_SWEEP: &str = "retention_sweep";
pub const OP_BOOTSTRAP: &str = "bootstrap";
