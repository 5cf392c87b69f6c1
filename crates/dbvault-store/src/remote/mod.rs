//! Remote Snapshot Store
//!
//! The engine talks to object storage only through `SnapshotStore`.
//! `CloudinaryStore` is the production implementation; `MemoryStore` backs
//! tests and local dry runs.

mod cloudinary;
mod memory;

pub use cloudinary::{CloudinaryCredentials, CloudinaryStore};
pub use memory::{MemoryOp, MemoryStore};

use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dbvault_core::model::{latest, DeleteOutcome, RemoteSnapshot};
use futures::stream::BoxStream;
use std::path::Path;

/// Stream of downloaded chunks; an `Err` item means the transfer broke
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Addressable snapshot storage organised by folder
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upload the file at `local_path` into `folder`, creating a new snapshot
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<RemoteSnapshot>;

    /// Every snapshot in `folder`, newest first
    async fn list(&self, folder: &str) -> Result<Vec<RemoteSnapshot>>;

    /// Most recently created snapshot in `folder`
    async fn latest(&self, folder: &str) -> Result<Option<RemoteSnapshot>> {
        let snapshots = self.list(folder).await?;
        Ok(latest(&snapshots).cloned())
    }

    /// Delete one snapshot by key
    async fn delete(&self, key: &str) -> Result<DeleteOutcome>;

    /// Delete several snapshots, reporting per key
    async fn delete_many(&self, keys: &[String]) -> Result<Vec<(String, DeleteOutcome)>>;

    /// Begin streaming the content of `snapshot` from its retrieval URL
    async fn open_download(&self, snapshot: &RemoteSnapshot) -> Result<ByteStream>;
}
