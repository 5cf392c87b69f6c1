//! Change detection between a local snapshot and the latest remote snapshot
//!
//! Size equality is the accepted heuristic: two different database states of
//! identical size are indistinguishable and the second one is not uploaded.
//! The remote fingerprint is carried on `RemoteSnapshot` but deliberately not
//! consulted here; gating on it would change backup frequency and cost.

use crate::model::{LocalSnapshot, RemoteSnapshot};

/// Decide whether `local` must be uploaded
///
/// - No remote snapshot: always upload.
/// - Otherwise upload iff the sizes differ.
pub fn should_upload(local: &LocalSnapshot, latest_remote: Option<&RemoteSnapshot>) -> bool {
    match latest_remote {
        None => true,
        Some(remote) => local.size_bytes != remote.size_bytes,
    }
}
