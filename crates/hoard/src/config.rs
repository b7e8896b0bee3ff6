use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::DownloadError;

/// Default maximum cache size, in bytes (100 MiB).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 104_857_600;

/// Default number of concurrently processing downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Describes the cache storage a [`Downloader`](crate::Downloader) should
/// use: where bytes live and how large the cache may grow before eviction.
#[derive(Debug, Clone)]
pub enum CacheProfile {
    /// Keep content and metadata in process memory.
    Memory {
        /// Maximum size, in bytes, to allow the cache to grow to.
        max_size: u64,
    },
    /// Keep content and metadata in a local directory.
    Disk {
        /// Directory to store cached content in.
        path: PathBuf,
        /// Maximum size, in bytes, to allow the cache to grow to.
        max_size: u64,
    },
}

impl CacheProfile {
    /// An in-memory profile with the given maximum size.
    pub fn memory(max_size: u64) -> Self {
        Self::Memory { max_size }
    }

    /// An on-disk profile rooted at the given directory with the given
    /// maximum size.
    pub fn disk(path: impl Into<PathBuf>, max_size: u64) -> Self {
        Self::Disk {
            path: path.into(),
            max_size,
        }
    }

    /// The profile's maximum size, in bytes.
    pub fn max_size(&self) -> u64 {
        match self {
            Self::Memory { max_size } | Self::Disk { max_size, .. } => *max_size,
        }
    }
}

impl Default for CacheProfile {
    fn default() -> Self {
        Self::memory(DEFAULT_MAX_CACHE_SIZE)
    }
}

/// Configurable options for the downloader
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Cache profile backing the downloader
    pub cache: CacheProfile,

    /// Maximum number of concurrently processing downloads; zero means
    /// unlimited (no queueing ever occurs)
    pub max_concurrent_downloads: usize,

    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            cache: CacheProfile::default(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: default_user_agent(),
            headers: DownloaderConfig::get_default_headers(),
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Product token sent as the default user agent, derived from the crate
/// version and host platform.
pub fn default_user_agent() -> String {
    format!(
        "hoard/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5) // Allow multiple connections to same host
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(DownloadError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloaderConfig::default();
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.follow_redirects);
        assert_eq!(config.cache.max_size(), 104_857_600);
    }

    #[test]
    fn test_default_user_agent_carries_version() {
        let user_agent = default_user_agent();
        assert!(user_agent.starts_with("hoard/"));
        assert!(user_agent.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_profile_constructors() {
        let memory = CacheProfile::memory(1024);
        assert_eq!(memory.max_size(), 1024);

        let disk = CacheProfile::disk("/tmp/hoard", 2048);
        assert_eq!(disk.max_size(), 2048);
        match disk {
            CacheProfile::Disk { path, .. } => assert_eq!(path, PathBuf::from("/tmp/hoard")),
            CacheProfile::Memory { .. } => panic!("expected a disk profile"),
        }
    }

    #[test]
    fn test_create_client() {
        let config = DownloaderConfig::default();
        assert!(create_client(&config).is_ok());
    }
}
