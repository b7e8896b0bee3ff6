//! # Download Results
//!
//! The terminal outcome of one download operation and the handle a caller
//! holds while the operation is in flight.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::DownloadError;

/// Callback invoked with the outcome of a completed or failed download.
/// Cancelled operations never reach the callback.
pub type DownloadCallback = Box<dyn FnOnce(DownloadResult) + Send + 'static>;

/// Outcome of one download operation. Exactly one of the three shapes
/// holds; content is only reachable through a completed operation.
#[derive(Debug, Clone)]
pub enum DownloadResult {
    /// The download finished with content, either fetched from the
    /// network or served from the cache.
    Complete {
        /// The downloaded content.
        content: Bytes,
        /// Whether the content was served from the cache without any
        /// network activity.
        was_cached: bool,
    },
    /// The download failed.
    Failed {
        /// The failure.
        error: Arc<DownloadError>,
    },
    /// The download was cancelled before it produced an outcome.
    Cancelled,
}

impl DownloadResult {
    /// Whether the operation completed with content.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Whether the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the content was served from the cache.
    pub fn was_cached(&self) -> bool {
        matches!(self, Self::Complete { was_cached: true, .. })
    }

    /// The downloaded content, if the operation completed.
    pub fn content(&self) -> Option<&Bytes> {
        match self {
            Self::Complete { content, .. } => Some(content),
            _ => None,
        }
    }

    /// The failure, if the operation failed.
    pub fn error(&self) -> Option<&DownloadError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Tracking handle for a submitted download.
///
/// The handle identifies the operation for
/// [`cancel`](crate::Downloader::cancel) and resolves exactly once with
/// the operation's final [`DownloadResult`].
#[derive(Debug)]
pub struct DownloadHandle {
    id: u64,
    receiver: oneshot::Receiver<DownloadResult>,
}

impl DownloadHandle {
    pub(crate) fn new(id: u64, receiver: oneshot::Receiver<DownloadResult>) -> Self {
        Self { id, receiver }
    }

    /// Identifier of the operation this handle tracks.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the operation's outcome. If the downloader is dropped
    /// before the operation finishes, the outcome is `Cancelled`.
    pub async fn wait(self) -> DownloadResult {
        self.receiver.await.unwrap_or(DownloadResult::Cancelled)
    }
}
