//! # Builder for DownloaderConfig
//!
//! This module provides a builder pattern implementation for creating and
//! customizing DownloaderConfig instances with a fluent API.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hoard_engine::{CacheProfile, DownloaderConfig};
//!
//! let config = DownloaderConfig::builder()
//!     .with_cache_profile(CacheProfile::disk("/var/cache/avatars", 50 * 1024 * 1024))
//!     .with_max_concurrent_downloads(8)
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CacheProfile, DownloaderConfig};

/// Builder for creating DownloaderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    /// Internal config being built
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Set the cache profile
    pub fn with_cache_profile(mut self, cache: CacheProfile) -> Self {
        self.config.cache = cache;
        self
    }

    /// Set the maximum number of concurrently processing downloads;
    /// zero means unlimited
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.config.max_concurrent_downloads = max;
        self
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Build the DownloaderConfig instance
    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = DownloaderConfigBuilder::new().build();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_downloads, 4);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_builder_customization() {
        let config = DownloaderConfigBuilder::new()
            .with_cache_profile(CacheProfile::memory(1024))
            .with_max_concurrent_downloads(2)
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(20))
            .with_follow_redirects(false)
            .with_user_agent("CustomUserAgent/1.0")
            .with_header("X-Custom-Header", "CustomValue")
            .build();

        assert_eq!(config.cache.max_size(), 1024);
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert!(!config.follow_redirects);
        assert_eq!(config.user_agent, "CustomUserAgent/1.0");

        // Verify custom header
        let header_value = config.headers.get("X-Custom-Header").unwrap();
        assert_eq!(header_value.to_str().unwrap(), "CustomValue");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let config = DownloaderConfigBuilder::new()
            .with_header("Bad Header Name", "value")
            .build();
        assert!(config.headers.get("Bad Header Name").is_none());
    }
}
