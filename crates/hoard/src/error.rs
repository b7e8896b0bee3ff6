use reqwest::StatusCode;

/// Errors raised by the cache engine and its storage collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache key must contain a value")]
    EmptyKey,

    #[error("metadata store error: {0}")]
    Metadata(#[from] sqlx::Error),

    #[error("blob store I/O error: {0}")]
    Blob(#[from] std::io::Error),
}

// Custom error type for download operations
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),
}
