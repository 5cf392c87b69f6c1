use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque content-equality token returned by the remote store (ETag-like)
///
/// Not guaranteed to be a cryptographic hash; only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A consistent copy of the live database taken at `taken_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

/// One snapshot stored in the remote backup folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    /// Storage key (public id), including the folder prefix
    pub key: String,
    pub size_bytes: u64,
    pub fingerprint: Fingerprint,
    /// Secure retrieval URL used for download
    pub secure_url: String,
    pub created_at: DateTime<Utc>,
}

/// Most recently created snapshot, if any
///
/// Ties on `created_at` resolve to the entry listed first.
pub fn latest(snapshots: &[RemoteSnapshot]) -> Option<&RemoteSnapshot> {
    snapshots.iter().fold(None, |best, s| match best {
        Some(b) if b.created_at >= s.created_at => Some(b),
        _ => Some(s),
    })
}
