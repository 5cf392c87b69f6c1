use super::snapshot::RemoteSnapshot;

/// Result of a startup restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The local database file was replaced by this remote snapshot
    Restored { key: String, size_bytes: u64 },
    /// The backup folder holds no snapshot yet
    NotFound,
}

/// Result of one backup cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new remote snapshot was created
    Uploaded(RemoteSnapshot),
    /// Local snapshot matched the latest remote one; nothing uploaded
    Unchanged { size_bytes: u64 },
    /// Another cycle was still in flight
    Skipped,
}

/// Per-key result of a remote delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed,
}

/// What a retention sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub already_gone: Vec<String>,
    pub failed: Vec<String>,
    pub retained: usize,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
