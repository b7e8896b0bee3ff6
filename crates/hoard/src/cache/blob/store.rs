use async_trait::async_trait;
use bytes::Bytes;
use tokio::io;

/// Storage capability required of a blob backend.
///
/// Implementations must never expose partial writes: a `fetch` either
/// returns the complete content previously stored under the id, or
/// nothing at all.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store content under the given id, replacing any existing content.
    async fn store(&self, id: &str, content: Bytes) -> io::Result<()>;

    /// Fetch the content stored under the given id, if any.
    async fn fetch(&self, id: &str) -> io::Result<Option<Bytes>>;

    /// Delete the content stored under the given id. Deleting an absent
    /// id is not an error.
    async fn delete(&self, id: &str) -> io::Result<()>;

    /// Whether content is stored under the given id.
    async fn contains(&self, id: &str) -> io::Result<bool>;
}
