//! # Download Task
//!
//! One cancellable unit of download work. A task is created on
//! submission, started at most once, and makes exactly one terminal
//! transition; whoever takes its completion first (the network path or a
//! cancellation) delivers the outcome, and the loser finds nothing left
//! to fire.

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::download::options::DownloadOptions;
use crate::download::result::{DownloadCallback, DownloadResult};
use crate::error::DownloadError;
use crate::key::CacheKey;

/// The deliverable end of a task: the caller's optional callback plus the
/// handle's completion channel. Consumed exactly once.
pub(crate) struct Completion {
    pub(crate) callback: Option<DownloadCallback>,
    pub(crate) sender: tokio::sync::oneshot::Sender<DownloadResult>,
}

impl Completion {
    /// Deliver a success or error outcome to the callback and the handle.
    pub(crate) fn deliver(self, result: DownloadResult) {
        if let Some(callback) = self.callback {
            callback(result.clone());
        }
        let _ = self.sender.send(result);
    }

    /// Resolve the handle as cancelled. The callback is never invoked
    /// for a cancelled task.
    pub(crate) fn deliver_cancelled(self) {
        let _ = self.sender.send(DownloadResult::Cancelled);
    }
}

/// started/finished are mutually exclusive; completion is present until
/// the terminal transition takes it.
struct Lifecycle {
    started: bool,
    finished: bool,
    completion: Option<Completion>,
}

pub(crate) struct DownloadTask {
    pub(crate) id: u64,
    pub(crate) url: Url,
    pub(crate) key: CacheKey,
    pub(crate) options: DownloadOptions,
    pub(crate) token: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl DownloadTask {
    pub(crate) fn new(
        id: u64,
        url: Url,
        key: CacheKey,
        options: DownloadOptions,
        completion: Completion,
    ) -> Self {
        Self {
            id,
            url,
            key,
            options,
            token: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle {
                started: false,
                finished: false,
                completion: Some(completion),
            }),
        }
    }

    /// Transition to started. Returns false if the task already started
    /// or finished, so duplicate starts are no-ops.
    pub(crate) fn begin(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.started || lifecycle.finished {
            return false;
        }
        lifecycle.started = true;
        true
    }

    /// Make the terminal transition, yielding the completion to deliver.
    /// Returns `None` if the task already finished.
    pub(crate) fn finish(&self) -> Option<Completion> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.finished {
            return None;
        }
        lifecycle.started = false;
        lifecycle.finished = true;
        lifecycle.completion.take()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.lifecycle.lock().finished
    }

    /// Perform the HTTP fetch for this task. Non-success statuses are
    /// reported as errors; the body is collected fully into memory.
    pub(crate) async fn fetch(&self, client: &Client) -> Result<Bytes, DownloadError> {
        let mut request = client.get(self.url.clone());

        if !self.options.headers.is_empty() {
            request = request.headers(self.options.headers.clone());
        }

        if let Some(user_agent) = &self.options.user_agent {
            request = request.header(header::USER_AGENT, user_agent);
        }

        if let Some(credentials) = &self.options.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(DownloadError::StatusCode(status));
        }

        Ok(response.bytes().await?)
    }
}
