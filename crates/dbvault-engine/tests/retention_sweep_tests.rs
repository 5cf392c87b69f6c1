// Retention sweep over snapshots aged 0..N days

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::FOLDER;
use dbvault_engine::RetentionSweeper;
use dbvault_store::remote::{MemoryOp, MemoryStore, SnapshotStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_sweep_deletes_exactly_those_older_than_window() {
    for n in 1..=6i64 {
        for k in 0..=(n as u32 + 1) {
            // Given: N snapshots with ages 0, 1, ..., N-1 days
            let store = Arc::new(MemoryStore::new());
            let now = Utc::now();
            let mut by_age = Vec::new();
            for age in 0..n {
                let snap = store
                    .insert(FOLDER, vec![age as u8; 8], now - ChronoDuration::days(age))
                    .unwrap();
                by_age.push((age, snap.key));
            }

            // When: Sweeping with a k-day window
            let report = RetentionSweeper::new(store.clone(), FOLDER, Duration::from_secs(5))
                .sweep_at(k, now)
                .await
                .unwrap();

            // Then: Exactly the snapshots aged more than k days are gone
            let mut expected: Vec<String> = by_age
                .iter()
                .filter(|(age, _)| *age > k as i64)
                .map(|(_, key)| key.clone())
                .collect();
            let mut deleted = report.deleted.clone();
            expected.sort();
            deleted.sort();
            assert_eq!(deleted, expected, "n={n} k={k}");

            // And: The age-0 snapshot always survives
            let remaining = store.list(FOLDER).await.unwrap();
            assert!(remaining.iter().any(|s| s.key == by_age[0].1), "n={n} k={k}");
            assert_eq!(remaining.len(), report.retained);
        }
    }
}

#[tokio::test]
async fn test_single_ancient_snapshot_is_kept() {
    // Given: One snapshot far outside any window
    let store = Arc::new(MemoryStore::new());
    let only = store
        .insert(FOLDER, &b"old"[..], Utc::now() - ChronoDuration::days(400))
        .unwrap();

    // When: Sweeping with a zero-day window
    let report = RetentionSweeper::new(store.clone(), FOLDER, Duration::from_secs(5))
        .sweep(0)
        .await
        .unwrap();

    // Then: It is still restorable
    assert!(report.deleted.is_empty());
    assert_eq!(store.latest(FOLDER).await.unwrap().unwrap().key, only.key);
}

#[tokio::test]
async fn test_delete_transport_failure_fails_cycle() {
    // Given: One expired snapshot and a store whose next delete call breaks
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store.insert(FOLDER, &b"a"[..], now - ChronoDuration::days(10)).unwrap();
    store.insert(FOLDER, &b"b"[..], now).unwrap();
    store.fail_next(MemoryOp::Delete).unwrap();

    // When: Sweeping
    let result = RetentionSweeper::new(store.clone(), FOLDER, Duration::from_secs(5))
        .sweep_at(3, now)
        .await;

    // Then: The transport failure surfaces as an error for the cycle
    assert!(result.is_err());
    assert_eq!(store.list(FOLDER).await.unwrap().len(), 2);
}
