//! # Cache Value Types
//!
//! Metadata records kept for each cached item and the running aggregate
//! maintained alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one cached item. Exactly one record exists per normalized
/// key, and its `size` always equals the byte length of the stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheItem {
    /// The item's normalized key.
    pub key: String,
    /// Size of the item's content, in bytes.
    pub size: u64,
    /// When the item was first written. Immutable for the item's lifetime.
    pub first_access_at: DateTime<Utc>,
    /// When the item was last written. Eviction orders by this field.
    pub last_access_at: DateTime<Utc>,
    /// Optional expiration; an item at or past this instant is unreachable.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheItem {
    /// Whether the item has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// Aggregate cache statistics, maintained transactionally with every item
/// insert and delete rather than recomputed by scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Number of items currently in the cache.
    pub item_count: u64,
    /// Total size of all cached content, in bytes.
    pub size: u64,
}
