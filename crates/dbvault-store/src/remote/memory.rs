use super::{ByteStream, SnapshotStore};
use crate::errors::{io_error, poisoned, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dbvault_core::errors::{ExError, ExErrorKind, VaultError};
use dbvault_core::model::{DeleteOutcome, Fingerprint, RemoteSnapshot};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Operations whose next call can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    Upload,
    List,
    Delete,
    Download,
}

struct StoredObject {
    meta: RemoteSnapshot,
    content: Bytes,
}

#[derive(Default)]
struct MemoryState {
    objects: Vec<StoredObject>,
    last_created: Option<DateTime<Utc>>,
    fail_next: HashSet<MemoryOp>,
    interrupt_after_chunks: Option<usize>,
    chunk_delay: Option<Duration>,
    op_delay: Option<Duration>,
    uploads: usize,
}

/// In-process snapshot store
///
/// Creation timestamps are strictly increasing so "latest" is always
/// unambiguous. Downloads are served in fixed-size chunks and can be made to
/// break part-way or to trickle slowly.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    chunk_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Seed a snapshot with an explicit creation time
    pub fn insert(
        &self,
        folder: &str,
        content: impl Into<Bytes>,
        created_at: DateTime<Utc>,
    ) -> Result<RemoteSnapshot> {
        let mut state = self.lock()?;
        let meta = store_object(&mut state, folder, content.into(), created_at);
        Ok(meta)
    }

    /// Make the next call of `op` fail with a network error
    pub fn fail_next(&self, op: MemoryOp) -> Result<()> {
        self.lock()?.fail_next.insert(op);
        Ok(())
    }

    /// Break every download after `chunks` chunks have been delivered
    pub fn interrupt_downloads_after(&self, chunks: Option<usize>) -> Result<()> {
        self.lock()?.interrupt_after_chunks = chunks;
        Ok(())
    }

    /// Sleep before delivering each download chunk
    pub fn set_chunk_delay(&self, delay: Option<Duration>) -> Result<()> {
        self.lock()?.chunk_delay = delay;
        Ok(())
    }

    /// Sleep before answering upload, list and delete calls
    pub fn set_op_delay(&self, delay: Option<Duration>) -> Result<()> {
        self.lock()?.op_delay = delay;
        Ok(())
    }

    /// Number of successful uploads so far
    pub fn upload_count(&self) -> Result<usize> {
        Ok(self.lock()?.uploads)
    }

    /// Stored bytes of a snapshot
    pub fn content(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self
            .lock()?
            .objects
            .iter()
            .find(|o| o.meta.key == key)
            .map(|o| o.content.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| poisoned("memory store"))
    }

    fn take_failure(&self, op: MemoryOp) -> Result<()> {
        if self.lock()?.fail_next.remove(&op) {
            return Err(VaultError::Transport {
                op: format!("{:?}", op).to_lowercase(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let delay = self.lock()?.op_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

fn store_object(
    state: &mut MemoryState,
    folder: &str,
    content: Bytes,
    created_at: DateTime<Utc>,
) -> RemoteSnapshot {
    let key = format!("{}/{}", folder, uuid::Uuid::now_v7().simple());
    let meta = RemoteSnapshot {
        key: key.clone(),
        size_bytes: content.len() as u64,
        fingerprint: Fingerprint::new(hex::encode(Sha256::digest(&content))),
        secure_url: format!("memory://{}", key),
        created_at,
    };
    state.objects.push(StoredObject {
        meta: meta.clone(),
        content,
    });
    meta
}

fn in_folder(key: &str, folder: &str) -> bool {
    key.strip_prefix(folder)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<RemoteSnapshot> {
        self.pause().await?;
        self.take_failure(MemoryOp::Upload)?;

        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| io_error("read_upload_source", e))?;

        let mut state = self.lock()?;
        let now = Utc::now();
        let created_at = match state.last_created {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        state.last_created = Some(created_at);
        state.uploads += 1;
        Ok(store_object(&mut state, folder, Bytes::from(content), created_at))
    }

    async fn list(&self, folder: &str) -> Result<Vec<RemoteSnapshot>> {
        self.pause().await?;
        self.take_failure(MemoryOp::List)?;

        let mut snapshots: Vec<RemoteSnapshot> = self
            .lock()?
            .objects
            .iter()
            .filter(|o| in_folder(&o.meta.key, folder))
            .map(|o| o.meta.clone())
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome> {
        self.pause().await?;
        self.take_failure(MemoryOp::Delete)?;

        let mut state = self.lock()?;
        let before = state.objects.len();
        state.objects.retain(|o| o.meta.key != key);
        Ok(if state.objects.len() < before {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn delete_many(&self, keys: &[String]) -> Result<Vec<(String, DeleteOutcome)>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push((key.clone(), self.delete(key).await?));
        }
        Ok(results)
    }

    async fn open_download(&self, snapshot: &RemoteSnapshot) -> Result<ByteStream> {
        self.take_failure(MemoryOp::Download)?;

        let (content, interrupt_after, delay) = {
            let state = self.lock()?;
            let content = state
                .objects
                .iter()
                .find(|o| o.meta.key == snapshot.key)
                .map(|o| o.content.clone())
                .ok_or_else(|| {
                    ExError::new(ExErrorKind::NotFound)
                        .with_op("download")
                        .with_key(snapshot.key.clone())
                })?;
            (content, state.interrupt_after_chunks, state.chunk_delay)
        };

        let mut items: Vec<Result<Bytes>> = Vec::new();
        let mut offset = 0;
        while offset < content.len() {
            if interrupt_after == Some(items.len()) {
                items.push(Err(VaultError::DownloadInterrupted {
                    key: snapshot.key.clone(),
                    reason: "connection reset by peer".to_string(),
                }
                .into()));
                break;
            }
            let end = (offset + self.chunk_size).min(content.len());
            items.push(Ok(content.slice(offset..end)));
            offset = end;
        }

        Ok(stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("snap.sqlite");
        let store = MemoryStore::new();

        std::fs::write(&file, b"one").unwrap();
        let first = store.upload(&file, "Backups").await.unwrap();
        std::fs::write(&file, b"second").unwrap();
        let second = store.upload(&file, "Backups").await.unwrap();

        assert!(second.created_at > first.created_at);
        let listed = store.list("Backups").await.unwrap();
        assert_eq!(listed, vec![second.clone(), first]);
        assert_eq!(store.latest("Backups").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_folder() {
        let store = MemoryStore::new();
        store.insert("Backups", &b"a"[..], Utc::now()).unwrap();
        store.insert("BackupsOld", &b"b"[..], Utc::now()).unwrap();
        store.insert("Uploads", &b"c"[..], Utc::now()).unwrap();

        assert_eq!(store.list("Backups").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_not_found() {
        let store = MemoryStore::new();
        let snap = store.insert("Backups", &b"a"[..], Utc::now()).unwrap();

        assert_eq!(store.delete(&snap.key).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete(&snap.key).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_download_chunks_reassemble() {
        let store = MemoryStore::with_chunk_size(3);
        let snap = store
            .insert("Backups", &b"0123456789"[..], Utc::now())
            .unwrap();

        let chunks: Vec<Bytes> = store
            .open_download(&snap)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn test_interrupted_download_yields_error() {
        let store = MemoryStore::with_chunk_size(2);
        let snap = store.insert("Backups", &b"abcdef"[..], Utc::now()).unwrap();
        store.interrupt_downloads_after(Some(1)).unwrap();

        let items: Vec<Result<Bytes>> = store.open_download(&snap).await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().code(), "ERR_NETWORK");
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(MemoryOp::List).unwrap();

        assert!(store.list("Backups").await.is_err());
        assert!(store.list("Backups").await.is_ok());
    }
}
