//! # Download Manager
//!
//! The primary interface for downloading cached + queued HTTP content.
//! Every submission checks the cache first; misses become tasks that run
//! under a concurrency cap, with the overflow waiting in a FIFO queue.
//! Successful downloads are written back into the cache on completion.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::cache::Cache;
use crate::config::{DownloaderConfig, create_client};
use crate::download::options::DownloadOptions;
use crate::download::result::{DownloadCallback, DownloadHandle, DownloadResult};
use crate::download::task::{Completion, DownloadTask};
use crate::error::DownloadError;
use crate::key::CacheKey;

#[derive(Default)]
struct TaskLists {
    processing: Vec<Arc<DownloadTask>>,
    queued: VecDeque<Arc<DownloadTask>>,
}

impl TaskLists {
    fn unlink(&mut self, id: u64) {
        self.processing.retain(|task| task.id != id);
        if let Some(pos) = self.queued.iter().position(|task| task.id == id) {
            self.queued.remove(pos);
        }
    }
}

struct Inner {
    client: Client,
    cache: Arc<Cache>,
    max_concurrent: usize,
    next_id: AtomicU64,
    lists: Mutex<TaskLists>,
}

/// Cached + queued HTTP content downloader.
///
/// Cloning is cheap and clones share the same cache, queue and
/// concurrency budget.
#[derive(Clone)]
pub struct Downloader {
    inner: Arc<Inner>,
}

impl Downloader {
    /// Create a downloader with the default configuration: an in-memory
    /// cache and four concurrent downloads.
    pub async fn new() -> Result<Self, DownloadError> {
        Self::with_config(DownloaderConfig::default()).await
    }

    /// Create a downloader with a custom configuration.
    pub async fn with_config(config: DownloaderConfig) -> Result<Self, DownloadError> {
        let client = create_client(&config)?;
        let cache = Arc::new(Cache::open(&config.cache).await?);

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                cache,
                max_concurrent: config.max_concurrent_downloads,
                next_id: AtomicU64::new(1),
                lists: Mutex::new(TaskLists::default()),
            }),
        })
    }

    /// The cache backing this downloader.
    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Maximum number of concurrently processing downloads; zero means
    /// unlimited.
    pub fn max_concurrent_downloads(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of downloads currently processing.
    pub fn processing_count(&self) -> usize {
        self.inner.lists.lock().processing.len()
    }

    /// Number of downloads waiting in the pending queue.
    pub fn queued_count(&self) -> usize {
        self.inner.lists.lock().queued.len()
    }

    /// Initiate a cached + queued download operation.
    pub async fn download(&self, url: &str) -> Result<DownloadHandle, DownloadError> {
        self.submit(url, DownloadOptions::default(), None).await
    }

    /// Initiate a cached + queued download operation with per-request
    /// options.
    pub async fn download_with_options(
        &self,
        url: &str,
        options: DownloadOptions,
    ) -> Result<DownloadHandle, DownloadError> {
        self.submit(url, options, None).await
    }

    /// Initiate a cached + queued download operation, invoking `callback`
    /// with the outcome. Cancelled operations resolve the returned handle
    /// but never invoke the callback.
    pub async fn download_with_callback(
        &self,
        url: &str,
        options: DownloadOptions,
        callback: impl FnOnce(DownloadResult) + Send + 'static,
    ) -> Result<DownloadHandle, DownloadError> {
        self.submit(url, options, Some(Box::new(callback))).await
    }

    async fn submit(
        &self,
        url: &str,
        options: DownloadOptions,
        callback: Option<DownloadCallback>,
    ) -> Result<DownloadHandle, DownloadError> {
        let parsed =
            Url::parse(url).map_err(|e| DownloadError::UrlError(format!("{url}: {e}")))?;
        let key = CacheKey::new(url)?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        // Cache hit: resolve on the spot, no queue entry, no network.
        if let Some(content) = self.inner.cache.get(key.as_str()).await? {
            debug!(url, "serving download from cache");
            let completion = Completion { callback, sender };
            completion.deliver(DownloadResult::Complete {
                content,
                was_cached: true,
            });
            return Ok(DownloadHandle::new(id, receiver));
        }

        let task = Arc::new(DownloadTask::new(
            id,
            parsed,
            key,
            options,
            Completion { callback, sender },
        ));

        let start_now = {
            let mut lists = self.inner.lists.lock();
            if self.inner.max_concurrent > 0
                && lists.processing.len() >= self.inner.max_concurrent
            {
                lists.queued.push_back(task.clone());
                false
            } else {
                lists.processing.push(task.clone());
                true
            }
        };

        if start_now {
            Inner::start(&self.inner, task);
        }

        Ok(DownloadHandle::new(id, receiver))
    }

    /// Cancel a pending or in-progress download operation.
    ///
    /// A queued operation is removed without ever touching the network;
    /// a processing one has its transport aborted and finishes with a
    /// cancelled outcome. Returns false if no matching operation is
    /// found (already completed or unknown handle).
    pub fn cancel(&self, handle: &DownloadHandle) -> bool {
        enum Found {
            Processing(Arc<DownloadTask>),
            Queued(Arc<DownloadTask>),
            None,
        }

        let found = {
            let mut lists = self.inner.lists.lock();
            if let Some(task) = lists.processing.iter().find(|t| t.id == handle.id()) {
                Found::Processing(task.clone())
            } else if let Some(pos) = lists.queued.iter().position(|t| t.id == handle.id()) {
                match lists.queued.remove(pos) {
                    Some(task) => Found::Queued(task),
                    None => Found::None,
                }
            } else {
                Found::None
            }
        };

        match found {
            Found::Processing(task) => {
                if task.is_finished() {
                    return false;
                }
                debug!(id = task.id, url = %task.url, "aborting in-flight download");
                task.token.cancel();
                true
            }
            Found::Queued(task) => {
                debug!(id = task.id, url = %task.url, "cancelling queued download");
                if let Some(completion) = task.finish() {
                    completion.deliver_cancelled();
                }
                true
            }
            Found::None => false,
        }
    }

    /// Cancel every pending and in-progress operation. Queued operations
    /// resolve as cancelled immediately; processing ones as their aborts
    /// are observed.
    pub fn shutdown(&self) {
        let (queued, processing) = {
            let mut lists = self.inner.lists.lock();
            let queued: Vec<_> = lists.queued.drain(..).collect();
            let processing = lists.processing.clone();
            (queued, processing)
        };

        for task in queued {
            if let Some(completion) = task.finish() {
                completion.deliver_cancelled();
            }
        }

        for task in processing {
            task.token.cancel();
        }
    }
}

impl Inner {
    fn start(self: &Arc<Self>, task: Arc<DownloadTask>) {
        if !task.begin() {
            // Lost a race with cancellation before the first poll.
            self.lists.lock().unlink(task.id);
            return;
        }

        let inner = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = task.token.cancelled() => None,
                result = task.fetch(&inner.client) => Some(result),
            };
            inner.complete(task, outcome).await;
        });
    }

    /// Completion bookkeeping, invoked once per task regardless of
    /// outcome. The callback runs after the list lock is released so a
    /// re-entrant caller cannot deadlock the manager.
    async fn complete(
        self: &Arc<Self>,
        task: Arc<DownloadTask>,
        outcome: Option<Result<Bytes, DownloadError>>,
    ) {
        self.lists.lock().unlink(task.id);

        if let Some(completion) = task.finish() {
            match outcome {
                Some(Ok(content)) => {
                    // Caching is an optimization; a failure to populate it
                    // does not fail the download.
                    if let Err(error) = self.cache.add(task.key.as_str(), content.clone()).await {
                        warn!(key = %task.key, %error, "failed to cache downloaded content");
                    }
                    completion.deliver(DownloadResult::Complete {
                        content,
                        was_cached: false,
                    });
                }
                Some(Err(error)) => {
                    completion.deliver(DownloadResult::Failed {
                        error: Arc::new(error),
                    });
                }
                None => completion.deliver_cancelled(),
            }
        }

        self.promote();
    }

    /// Move the earliest-submitted pending task into a processing slot,
    /// if one is free.
    fn promote(self: &Arc<Self>) {
        let task = {
            let mut lists = self.lists.lock();
            if self.max_concurrent == 0 || lists.processing.len() < self.max_concurrent {
                match lists.queued.pop_front() {
                    Some(task) => {
                        lists.processing.push(task.clone());
                        Some(task)
                    }
                    None => None,
                }
            } else {
                None
            }
        };

        if let Some(task) = task {
            self.start(task);
        }
    }
}
