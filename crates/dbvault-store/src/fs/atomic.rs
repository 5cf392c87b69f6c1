//! Atomic write primitives
//!
//! Uses temp→fsync→rename so a reader of the target path only ever sees the
//! previous file, no file, or the complete new file.

use crate::errors::{io_error, Result};
use dbvault_core::errors::ExErrorKind;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Temp path used while `target` is being written: `<target>.tmp`
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Delete a file, treating "does not exist" as success
///
/// Returns whether a file was actually removed.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error("remove_file", e).with_path(path.display().to_string())),
    }
}

/// A file being written next to its final location
///
/// Nothing appears at the target path until `commit` succeeds. Dropping an
/// uncommitted `AtomicFile` removes the temp file.
pub struct AtomicFile {
    target: PathBuf,
    temp: PathBuf,
    file: Option<File>,
    written: u64,
    committed: bool,
}

impl AtomicFile {
    /// Start writing a replacement for `target`
    ///
    /// Creates the parent directory if needed and discards any stale temp
    /// file left by an earlier interrupted write.
    pub async fn create(target: &Path) -> Result<Self> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create_parent_dir", e))?;
        }

        let temp = temp_path_for(target);
        remove_if_exists(&temp).await?;

        let file = File::create(&temp)
            .await
            .map_err(|e| io_error("create_temp", e).with_path(temp.display().to_string()))?;

        Ok(Self {
            target: target.to_path_buf(),
            temp,
            file: Some(file),
            written: 0,
            committed: false,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append a chunk to the temp file
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.open_file()?;
        file.write_all(chunk)
            .await
            .map_err(|e| io_error("write_temp", e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush, fsync and rename the temp file over the target
    ///
    /// Returns the number of bytes now at the target path. On failure the
    /// temp file is removed when `self` drops.
    pub async fn commit(mut self) -> Result<u64> {
        let mut file = self.file.take().ok_or_else(closed)?;
        file.flush().await.map_err(|e| io_error("flush_temp", e))?;
        file.sync_all().await.map_err(|e| io_error("fsync_temp", e))?;
        drop(file);

        fs::rename(&self.temp, &self.target)
            .await
            .map_err(|e| io_error("rename_temp", e).with_path(self.target.display().to_string()))?;
        self.committed = true;

        sync_parent_dir(&self.target).await;
        Ok(self.written)
    }

    /// Discard everything written so far
    pub async fn abort(mut self) -> Result<()> {
        self.file.take();
        remove_if_exists(&self.temp).await.map(|_| ())
    }

    fn open_file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(closed)
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        // Close before unlinking
        self.file.take();
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}

fn closed() -> dbvault_core::ExError {
    dbvault_core::ExError::new(ExErrorKind::Internal)
        .with_op("atomic_file")
        .with_message("file already committed or aborted")
}

#[cfg(unix)]
async fn sync_parent_dir(target: &Path) {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent).await {
            if let Err(e) = dir.sync_all().await {
                tracing::debug!(error = %e, "Directory fsync failed");
            }
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_target: &Path) {}
