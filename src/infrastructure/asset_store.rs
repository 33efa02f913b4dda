//! Flat on-disk asset store
//!
//! Files are named `<uuid-v4>.<ext>` and live directly under the store root,
//! where the file-serving endpoint picks them up by name.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Fresh collision-free filename for the given extension
    pub fn new_filename(extension: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'))
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Open a new file for writing; it is removed again unless [`AssetFile::finish`] succeeds
    pub async fn create(&self, filename: &str) -> io::Result<AssetFile> {
        let path = self.path_for(filename);
        let file = File::create(&path).await?;
        Ok(AssetFile {
            file: Some(file),
            path,
            committed: false,
        })
    }
}

/// File being written into the store
#[derive(Debug)]
pub struct AssetFile {
    file: Option<File>,
    path: PathBuf,
    committed: bool,
}

impl AssetFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await,
            None => Err(io::Error::other("asset file already closed")),
        }
    }

    /// Flush to disk and return the stored size
    pub async fn finish(mut self) -> io::Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        let size = fs::metadata(&self.path).await?.len();
        self.committed = true;
        Ok(size)
    }

    /// Remove the partial file now
    pub async fn discard(mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!("Failed to remove partial asset {:?}: {}", self.path, e);
        }
        self.committed = true;
    }
}

impl Drop for AssetFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed unfinished asset {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove unfinished asset {:?}: {}", self.path, e),
        }
    }
}
