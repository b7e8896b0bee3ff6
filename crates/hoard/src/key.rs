//! # Cache Keys
//!
//! Canonical identifiers for cached content. A key is the case-normalized
//! form of the URL (or raw string) it was created from, so lookups are
//! case-insensitive on the textual form. The storage id derived from a key
//! names the blob on whatever storage backend holds the content.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::CacheError;

/// A normalized cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    /// Create a key from a raw string, normalizing it to its canonical
    /// uppercase form. Empty input is rejected before it can reach storage.
    pub fn new(raw: &str) -> Result<Self, CacheError> {
        if raw.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        Ok(Self {
            key: raw.to_uppercase(),
        })
    }

    /// Create a key from a parsed URL.
    pub fn from_url(url: &Url) -> Self {
        Self {
            key: url.as_str().to_uppercase(),
        }
    }

    /// Wrap a key read back from the metadata store, which only ever
    /// holds already-normalized keys.
    pub(crate) fn from_normalized(key: String) -> Self {
        Self { key }
    }

    /// The normalized textual form of the key.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Content-addressed identifier for this key's blob, stable across
    /// processes. SHA-256 of the normalized key, hex encoded.
    pub fn storage_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_insensitive() {
        let a = CacheKey::new("http://example.com/Domo.png").unwrap();
        let b = CacheKey::new("HTTP://EXAMPLE.COM/DOMO.PNG").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "HTTP://EXAMPLE.COM/DOMO.PNG");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(CacheKey::new(""), Err(CacheError::EmptyKey)));
    }

    #[test]
    fn test_storage_id_is_stable() {
        let a = CacheKey::new("http://example.com/a").unwrap();
        let b = CacheKey::new("http://EXAMPLE.com/A").unwrap();
        assert_eq!(a.storage_id(), b.storage_id());
        assert_eq!(a.storage_id().len(), 64);
        assert!(a.storage_id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_from_url_matches_new() {
        let url = Url::parse("http://example.com/Domo.png").unwrap();
        let from_url = CacheKey::from_url(&url);
        let from_str = CacheKey::new(url.as_str()).unwrap();
        assert_eq!(from_url, from_str);
    }
}
