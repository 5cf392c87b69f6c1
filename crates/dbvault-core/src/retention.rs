//! Retention window selection
//!
//! Picks which remote snapshots a sweep deletes. The single most recent
//! snapshot is never selected, so at least one restorable snapshot survives
//! every sweep.

use crate::model::RemoteSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Snapshots strictly older than `max_age_days` relative to `now`,
/// excluding the most recent snapshot.
///
/// A snapshot created exactly `max_age_days` ago is kept.
pub fn select_expired(
    snapshots: &[RemoteSnapshot],
    max_age_days: u32,
    now: DateTime<Utc>,
) -> Vec<&RemoteSnapshot> {
    let Some(newest) = newest_index(snapshots) else {
        return Vec::new();
    };
    let cutoff = now - Duration::days(i64::from(max_age_days));

    snapshots
        .iter()
        .enumerate()
        .filter(|(i, s)| *i != newest && s.created_at < cutoff)
        .map(|(_, s)| s)
        .collect()
}

fn newest_index(snapshots: &[RemoteSnapshot]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, s) in snapshots.iter().enumerate() {
        match best {
            Some(b) if snapshots[b].created_at >= s.created_at => {}
            _ => best = Some(i),
        }
    }
    best
}
