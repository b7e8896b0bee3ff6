//! # Memory Blob Store
//!
//! Heap-backed blob storage. Each instance owns its own map; callers that
//! want to share contents between caches share the store instance itself.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::io;

use super::BlobStore;

/// In-memory blob store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, id: &str, content: Bytes) -> io::Result<()> {
        self.entries.write().insert(id.to_owned(), content);
        Ok(())
    }

    async fn fetch(&self, id: &str) -> io::Result<Option<Bytes>> {
        Ok(self.entries.read().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> io::Result<()> {
        self.entries.write().remove(id);
        Ok(())
    }

    async fn contains(&self, id: &str) -> io::Result<bool> {
        Ok(self.entries.read().contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_fetch_delete() {
        let store = MemoryBlobStore::new();

        assert!(store.fetch("id").await.unwrap().is_none());
        assert!(!store.contains("id").await.unwrap());

        store.store("id", Bytes::from_static(b"content")).await.unwrap();
        assert!(store.contains("id").await.unwrap());
        assert_eq!(
            store.fetch("id").await.unwrap().unwrap(),
            Bytes::from_static(b"content")
        );

        store.delete("id").await.unwrap();
        assert!(store.fetch("id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let store = MemoryBlobStore::new();
        store.store("id", Bytes::from_static(b"one")).await.unwrap();
        store.store("id", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(
            store.fetch("id").await.unwrap().unwrap(),
            Bytes::from_static(b"two")
        );
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryBlobStore::new();
        store.delete("never-stored").await.unwrap();
    }
}
