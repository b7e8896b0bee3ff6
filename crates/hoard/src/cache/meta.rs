//! # Metadata Store
//!
//! Embedded SQLite store holding one row per cache item plus a single-row
//! aggregate table. Every mutation the engine performs runs inside one
//! transaction, and each item insert/delete adjusts the aggregate row in
//! the same transaction, so the statistics can never drift from the item
//! rows. Dropping an uncommitted transaction rolls it back.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};

use crate::cache::types::{CacheItem, CacheStatistics};
use crate::error::CacheError;
use crate::key::CacheKey;

/// An open metadata transaction. Rolls back when dropped without commit.
pub(crate) type MetaTransaction = sqlx::Transaction<'static, Sqlite>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_item
(
    key             TEXT    NOT NULL PRIMARY KEY,
    size            INTEGER NOT NULL,
    first_access_at TEXT    NOT NULL,
    last_access_at  TEXT    NOT NULL,
    expires_at      TEXT
);

CREATE INDEX IF NOT EXISTS idx_cache_item_last_access_at ON cache_item (last_access_at);
CREATE INDEX IF NOT EXISTS idx_cache_item_expires_at ON cache_item (expires_at);

CREATE TABLE IF NOT EXISTS cache_statistics
(
    item_count INTEGER NOT NULL,
    size       INTEGER NOT NULL
);

INSERT INTO cache_statistics (item_count, size)
SELECT 0, 0
WHERE NOT EXISTS (SELECT 1 FROM cache_statistics);
";

/// Transactional metadata store for cache items and aggregate statistics.
#[derive(Debug, Clone)]
pub(crate) struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open an in-memory store. The pool is pinned to a single connection
    /// because every new in-memory connection is a fresh empty database.
    pub(crate) async fn open_in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::bootstrap(pool).await
    }

    /// Open (creating if missing) an on-disk store at the given file path.
    pub(crate) async fn open_on_disk(path: &Path) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::bootstrap(pool).await
    }

    async fn bootstrap(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Begin a transaction covering one logical cache mutation.
    pub(crate) async fn begin(&self) -> Result<MetaTransaction, CacheError> {
        Ok(self.pool.begin().await?)
    }

    /// Look up an item by key outside any transaction.
    pub(crate) async fn item(&self, key: &CacheKey) -> Result<Option<CacheItem>, CacheError> {
        let row = sqlx::query(
            "SELECT key, size, first_access_at, last_access_at, expires_at
             FROM cache_item WHERE key = ?1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_item).transpose()
    }

    /// Look up an item by key within an open transaction.
    pub(crate) async fn item_in_tx(
        &self,
        tx: &mut MetaTransaction,
        key: &CacheKey,
    ) -> Result<Option<CacheItem>, CacheError> {
        let row = sqlx::query(
            "SELECT key, size, first_access_at, last_access_at, expires_at
             FROM cache_item WHERE key = ?1",
        )
        .bind(key.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(row_to_item).transpose()
    }

    /// Insert an item row and bump the aggregate in the same transaction.
    /// Returns the updated aggregate.
    pub(crate) async fn insert_item(
        &self,
        tx: &mut MetaTransaction,
        item: &CacheItem,
    ) -> Result<CacheStatistics, CacheError> {
        sqlx::query(
            "INSERT INTO cache_item (key, size, first_access_at, last_access_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&item.key)
        .bind(item.size as i64)
        .bind(item.first_access_at)
        .bind(item.last_access_at)
        .bind(item.expires_at)
        .execute(&mut **tx)
        .await?;

        sqlx::query("UPDATE cache_statistics SET item_count = item_count + 1, size = size + ?1")
            .bind(item.size as i64)
            .execute(&mut **tx)
            .await?;

        self.statistics_in_tx(tx).await
    }

    /// Delete an item row by key and bump the aggregate in the same
    /// transaction. Deleting an absent key leaves the aggregate untouched.
    /// Returns the updated aggregate.
    pub(crate) async fn delete_item(
        &self,
        tx: &mut MetaTransaction,
        key: &str,
        size: u64,
    ) -> Result<CacheStatistics, CacheError> {
        let deleted = sqlx::query("DELETE FROM cache_item WHERE key = ?1")
            .bind(key)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if deleted > 0 {
            sqlx::query(
                "UPDATE cache_statistics SET item_count = item_count - 1, size = size - ?1",
            )
            .bind(size as i64)
            .execute(&mut **tx)
            .await?;
        }

        self.statistics_in_tx(tx).await
    }

    /// Items in ascending `last_access_at` order, i.e. the next eviction
    /// victims, limited to one batch.
    pub(crate) async fn eviction_candidates(
        &self,
        tx: &mut MetaTransaction,
        limit: i64,
    ) -> Result<Vec<(String, u64)>, CacheError> {
        let rows = sqlx::query(
            "SELECT key, size FROM cache_item ORDER BY last_access_at ASC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(row_to_key_size).collect()
    }

    /// Items whose expiration is set and in the past, limited to one batch.
    pub(crate) async fn expired_items(
        &self,
        tx: &mut MetaTransaction,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(String, u64)>, CacheError> {
        let rows = sqlx::query(
            "SELECT key, size FROM cache_item
             WHERE expires_at IS NOT NULL AND expires_at <= ?1
             LIMIT ?2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(row_to_key_size).collect()
    }

    /// The aggregate row, read outside any transaction.
    pub(crate) async fn statistics(&self) -> Result<CacheStatistics, CacheError> {
        let row = sqlx::query("SELECT item_count, size FROM cache_statistics")
            .fetch_one(&self.pool)
            .await?;

        row_to_statistics(row)
    }

    /// The aggregate row, read within an open transaction.
    pub(crate) async fn statistics_in_tx(
        &self,
        tx: &mut MetaTransaction,
    ) -> Result<CacheStatistics, CacheError> {
        let row = sqlx::query("SELECT item_count, size FROM cache_statistics")
            .fetch_one(&mut **tx)
            .await?;

        row_to_statistics(row)
    }
}

fn row_to_item(row: SqliteRow) -> Result<CacheItem, CacheError> {
    Ok(CacheItem {
        key: row.try_get("key").map_err(CacheError::Metadata)?,
        size: row.try_get::<i64, _>("size").map_err(CacheError::Metadata)? as u64,
        first_access_at: row
            .try_get("first_access_at")
            .map_err(CacheError::Metadata)?,
        last_access_at: row
            .try_get("last_access_at")
            .map_err(CacheError::Metadata)?,
        expires_at: row.try_get("expires_at").map_err(CacheError::Metadata)?,
    })
}

fn row_to_key_size(row: SqliteRow) -> Result<(String, u64), CacheError> {
    let key: String = row.try_get("key").map_err(CacheError::Metadata)?;
    let size: i64 = row.try_get("size").map_err(CacheError::Metadata)?;
    Ok((key, size as u64))
}

fn row_to_statistics(row: SqliteRow) -> Result<CacheStatistics, CacheError> {
    let item_count: i64 = row.try_get("item_count").map_err(CacheError::Metadata)?;
    let size: i64 = row.try_get("size").map_err(CacheError::Metadata)?;
    Ok(CacheStatistics {
        item_count: item_count.max(0) as u64,
        size: size.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, size: u64) -> CacheItem {
        let now = Utc::now();
        CacheItem {
            key: key.to_owned(),
            size,
            first_access_at: now,
            last_access_at: now,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_empty_statistics() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats, CacheStatistics::default());
    }

    #[tokio::test]
    async fn test_insert_and_delete_adjust_aggregate() {
        let store = MetadataStore::open_in_memory().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let stats = store.insert_item(&mut tx, &item("A", 100)).await.unwrap();
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.size, 100);
        let stats = store.insert_item(&mut tx, &item("B", 50)).await.unwrap();
        assert_eq!(stats.item_count, 2);
        assert_eq!(stats.size, 150);
        let stats = store.delete_item(&mut tx, "A", 100).await.unwrap();
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.size, 50);
        tx.commit().await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.size, 50);
    }

    #[tokio::test]
    async fn test_delete_absent_key_leaves_aggregate() {
        let store = MetadataStore::open_in_memory().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let stats = store.delete_item(&mut tx, "MISSING", 999).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stats, CacheStatistics::default());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MetadataStore::open_in_memory().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            store.insert_item(&mut tx, &item("A", 100)).await.unwrap();
            // Dropped without commit.
        }

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats, CacheStatistics::default());
        let key = CacheKey::new("A").unwrap();
        assert!(store.item(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eviction_candidates_order_oldest_first() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let base = Utc::now();

        let mut tx = store.begin().await.unwrap();
        for (i, key) in ["B", "C", "A"].iter().enumerate() {
            let mut it = item(key, 10);
            it.last_access_at = base + chrono::Duration::milliseconds(i as i64 * 10);
            store.insert_item(&mut tx, &it).await.unwrap();
        }

        let candidates = store.eviction_candidates(&mut tx, 2).await.unwrap();
        let keys: Vec<&str> = candidates.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["B", "C"]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_items_only_past_expirations() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        let mut past = item("PAST", 10);
        past.expires_at = Some(now - chrono::Duration::seconds(10));
        store.insert_item(&mut tx, &past).await.unwrap();
        let mut future = item("FUTURE", 10);
        future.expires_at = Some(now + chrono::Duration::seconds(3600));
        store.insert_item(&mut tx, &future).await.unwrap();
        store.insert_item(&mut tx, &item("NONE", 10)).await.unwrap();

        let expired = store.expired_items(&mut tx, now, 100).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, "PAST");
        tx.commit().await.unwrap();
    }
}
