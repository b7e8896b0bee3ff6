//! # Hoard
//!
//! A content-addressable HTTP download cache: remote resources are
//! fetched once, stored under their normalized URL, and served from the
//! cache afterwards, subject to a size budget and optional per-item
//! expiration.
//!
//! ## Features
//!
//! - Cache-first download submission with FIFO queueing under a
//!   concurrency cap
//! - Cancellation of queued and in-flight downloads
//! - Transactional item metadata with always-consistent aggregate
//!   statistics
//! - Size-bounded eviction (least recently written first) and
//!   expiration sweeping
//! - Pluggable blob storage with in-memory and on-disk backends

pub mod builder;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod key;

pub use builder::DownloaderConfigBuilder;
pub use cache::{BlobStore, Cache, CacheItem, CacheStatistics, FileBlobStore, MemoryBlobStore};
pub use config::{CacheProfile, DownloaderConfig, create_client};
pub use download::{
    Credentials, DownloadCallback, DownloadHandle, DownloadOptions, DownloadResult, Downloader,
};
pub use error::{CacheError, DownloadError};
pub use key::CacheKey;
