//! # Download Management
//!
//! Cache-first download submission, bounded-concurrency task execution
//! and cancellation.

mod manager;
mod options;
mod result;
mod task;

pub use manager::Downloader;
pub use options::{Credentials, DownloadOptions};
pub use result::{DownloadCallback, DownloadHandle, DownloadResult};
