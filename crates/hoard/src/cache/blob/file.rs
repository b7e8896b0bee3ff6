//! # File Blob Store
//!
//! Durable blob storage keeping one file per blob, named by storage id.
//! Writes go to a temporary sibling first and are renamed into place, so
//! a concurrent fetch never observes a half-written blob.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::warn;

use super::BlobStore;

/// On-disk blob store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
    initialized: Arc<AtomicBool>,
}

impl FileBlobStore {
    /// Create a store rooted at the given directory. The directory is
    /// created lazily on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The directory this store keeps blobs in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_initialized(&self) -> io::Result<()> {
        // Fast path - already initialized
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        // Use compare_exchange to ensure only one task initializes
        if self
            .initialized
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            fs::create_dir_all(&self.dir).await?;
            self.initialized.store(true, Ordering::Release);
        } else {
            // Another task is initializing, wait for it to complete
            while !self.initialized.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
        }

        Ok(())
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn store(&self, id: &str, content: Bytes) -> io::Result<()> {
        self.ensure_initialized().await?;

        let path = self.blob_path(id);
        let temp_path = path.with_extension("tmp");

        if let Err(e) = fs::write(&temp_path, &content).await {
            warn!(path = ?temp_path, error = %e, "Failed to write blob file");
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(from = ?temp_path, to = ?path, error = %e, "Failed to rename blob file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        Ok(())
    }

    async fn fetch(&self, id: &str) -> io::Result<Option<Bytes>> {
        self.ensure_initialized().await?;

        match fs::read(self.blob_path(id)).await {
            Ok(content) => Ok(Some(Bytes::from(content))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, id: &str) -> io::Result<()> {
        self.ensure_initialized().await?;

        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(id, error = %e, "Failed to remove blob file");
                Err(e)
            }
        }
    }

    async fn contains(&self, id: &str) -> io::Result<bool> {
        self.ensure_initialized().await?;
        fs::try_exists(self.blob_path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_fetch_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("blobs"));

        assert!(store.fetch("abc123").await.unwrap().is_none());

        store
            .store("abc123", Bytes::from_static(b"content"))
            .await
            .unwrap();
        assert!(store.contains("abc123").await.unwrap());
        assert_eq!(
            store.fetch("abc123").await.unwrap().unwrap(),
            Bytes::from_static(b"content")
        );

        store.delete("abc123").await.unwrap();
        assert!(!store.contains("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("blobs"));

        store.store("abc123", Bytes::from_static(b"x")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["abc123"]);
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("blobs"));
        store.delete("never-stored").await.unwrap();
    }
}
