//! # Cache Engine
//!
//! Orchestrates key normalization, the metadata store and a blob store
//! into a size-bounded cache with optional per-item expiration. Every
//! mutation runs inside a single metadata transaction; on any error the
//! transaction rolls back and the cache is left exactly as it was.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::blob::{BlobStore, FileBlobStore, MemoryBlobStore};
use crate::cache::meta::{MetaTransaction, MetadataStore};
use crate::cache::types::{CacheItem, CacheStatistics};
use crate::config::CacheProfile;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Number of rows fetched per eviction query. Keeps a single sweep over a
/// large cache from ballooning one transaction.
const EVICTION_BATCH_SIZE: i64 = 100;

/// Database file name used by the on-disk profile.
const DB_FILE_NAME: &str = "hoard.sqlite";

/// A size-bounded download cache.
///
/// Mutations on one instance are serialized through a single async lock
/// around the metadata transaction region; reads of already-hydrated
/// statistics don't take it.
pub struct Cache {
    meta: MetadataStore,
    blobs: Arc<dyn BlobStore>,
    max_size: u64,
    tx_gate: tokio::sync::Mutex<()>,
    stats: parking_lot::Mutex<Option<CacheStatistics>>,
}

impl Cache {
    /// Open a cache for the given profile.
    pub async fn open(profile: &CacheProfile) -> Result<Self, CacheError> {
        match profile {
            CacheProfile::Memory { max_size } => {
                let meta = MetadataStore::open_in_memory().await?;
                Ok(Self::assemble(meta, Arc::new(MemoryBlobStore::new()), *max_size))
            }
            CacheProfile::Disk { path, max_size } => {
                tokio::fs::create_dir_all(path).await?;
                let meta = MetadataStore::open_on_disk(&path.join(DB_FILE_NAME)).await?;
                Ok(Self::assemble(meta, Arc::new(FileBlobStore::new(path.clone())), *max_size))
            }
        }
    }

    pub(crate) fn assemble(
        meta: MetadataStore,
        blobs: Arc<dyn BlobStore>,
        max_size: u64,
    ) -> Self {
        Self {
            meta,
            blobs,
            max_size,
            tx_gate: tokio::sync::Mutex::new(()),
            stats: parking_lot::Mutex::new(None),
        }
    }

    /// Add an item to the cache, replacing any existing item under the
    /// same normalized key. If the cache was configured with a maximum
    /// size and the new total exceeds it, eviction runs before the
    /// transaction commits.
    pub async fn add(&self, key: &str, content: Bytes) -> Result<(), CacheError> {
        self.add_impl(key, content, None).await
    }

    /// Like [`add`](Self::add), but the item becomes unreachable once
    /// `expires_at` passes and is physically removed by the next sweep.
    pub async fn add_expiring(
        &self,
        key: &str,
        content: Bytes,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.add_impl(key, content, Some(expires_at)).await
    }

    async fn add_impl(
        &self,
        key: &str,
        content: Bytes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        let key = CacheKey::new(key)?;
        let now = Utc::now();
        let item = CacheItem {
            key: key.as_str().to_owned(),
            size: content.len() as u64,
            first_access_at: now,
            last_access_at: now,
            expires_at,
        };

        let _gate = self.tx_gate.lock().await;
        let mut tx = self.meta.begin().await?;

        self.remove_in_tx(&mut tx, &key).await?;
        let mut stats = self.meta.insert_item(&mut tx, &item).await?;
        self.blobs.store(&key.storage_id(), content).await?;

        if self.max_size > 0 && stats.size > self.max_size {
            stats = self.evict_in_tx(&mut tx, self.max_size, stats).await?;
        }

        tx.commit().await?;
        self.set_stats(stats);
        Ok(())
    }

    /// Get an item's content by key. Returns `None` for absent, expired
    /// or corrupt items; the latter two are removed on the way out.
    ///
    /// A hit does not refresh the item's `last_access_at`: eviction
    /// recency is based on the last write, not the last read, so
    /// read-heavy items still age out in overwrite order.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let key = CacheKey::new(key)?;

        let Some(item) = self.meta.item(&key).await? else {
            return Ok(None);
        };

        if item.is_expired(Utc::now()) {
            debug!(key = %key, "cached item expired, removing");
            self.remove_key(&key).await?;
            return Ok(None);
        }

        match self.blobs.fetch(&key.storage_id()).await? {
            Some(content) => Ok(Some(content)),
            None => {
                // Metadata without a blob: self-heal rather than error.
                warn!(key = %key, "cached item has no stored content, removing");
                self.remove_key(&key).await?;
                Ok(None)
            }
        }
    }

    /// Remove an item from the cache. Removing an absent key is a no-op.
    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let key = CacheKey::new(key)?;
        self.remove_key(&key).await
    }

    async fn remove_key(&self, key: &CacheKey) -> Result<(), CacheError> {
        let _gate = self.tx_gate.lock().await;
        let mut tx = self.meta.begin().await?;
        let stats = self.remove_in_tx(&mut tx, key).await?;
        tx.commit().await?;

        if let Some(stats) = stats {
            self.set_stats(stats);
        }

        Ok(())
    }

    /// Evict items until the total cache size is no larger than
    /// `max_size`. Expired items are purged first regardless of size,
    /// then the least recently written items go until the budget holds.
    pub async fn evict_to_size(&self, max_size: u64) -> Result<(), CacheError> {
        let _gate = self.tx_gate.lock().await;
        let mut tx = self.meta.begin().await?;
        let stats = self.meta.statistics_in_tx(&mut tx).await?;
        let stats = self.evict_in_tx(&mut tx, max_size, stats).await?;
        tx.commit().await?;
        self.set_stats(stats);
        Ok(())
    }

    /// The number of items in the cache.
    pub async fn item_count(&self) -> Result<u64, CacheError> {
        Ok(self.statistics().await?.item_count)
    }

    /// The total size of all cached content, in bytes.
    pub async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.statistics().await?.size)
    }

    /// Aggregate statistics. Hydrated from the metadata store on first
    /// access, then kept current by every transactional mutation.
    pub async fn statistics(&self) -> Result<CacheStatistics, CacheError> {
        if let Some(stats) = *self.stats.lock() {
            return Ok(stats);
        }

        let stats = self.meta.statistics().await?;
        *self.stats.lock() = Some(stats);
        Ok(stats)
    }

    fn set_stats(&self, stats: CacheStatistics) {
        *self.stats.lock() = Some(stats);
    }

    /// Delete one item and its blob within an open transaction. Returns
    /// the updated aggregate, or `None` if the key was absent.
    async fn remove_in_tx(
        &self,
        tx: &mut MetaTransaction,
        key: &CacheKey,
    ) -> Result<Option<CacheStatistics>, CacheError> {
        let Some(item) = self.meta.item_in_tx(tx, key).await? else {
            return Ok(None);
        };

        let stats = self.meta.delete_item(tx, &item.key, item.size).await?;
        self.blobs.delete(&key.storage_id()).await?;
        Ok(Some(stats))
    }

    /// Purge expired items, then delete least-recently-written items in
    /// batches until the total size fits the budget. Runs within the
    /// caller's transaction.
    async fn evict_in_tx(
        &self,
        tx: &mut MetaTransaction,
        max_size: u64,
        mut stats: CacheStatistics,
    ) -> Result<CacheStatistics, CacheError> {
        let now = Utc::now();

        loop {
            let expired = self.meta.expired_items(tx, now, EVICTION_BATCH_SIZE).await?;
            if expired.is_empty() {
                break;
            }

            for (key, size) in expired {
                stats = self.meta.delete_item(tx, &key, size).await?;
                self.blobs.delete(&CacheKey::from_normalized(key).storage_id()).await?;
            }
        }

        while stats.size > max_size && stats.item_count > 0 {
            let victims = self.meta.eviction_candidates(tx, EVICTION_BATCH_SIZE).await?;
            if victims.is_empty() {
                break;
            }

            for (key, size) in victims {
                debug!(key = %key, size, "evicting cached item");
                stats = self.meta.delete_item(tx, &key, size).await?;
                self.blobs.delete(&CacheKey::from_normalized(key).storage_id()).await?;

                if stats.size <= max_size {
                    break;
                }
            }
        }

        Ok(stats)
    }
}
