//! # Blob Storage
//!
//! Raw byte storage for cached content, indexed by content-addressed
//! storage id. The engine keeps item metadata elsewhere; backends here
//! only ever see opaque ids and bytes.

mod file;
mod memory;
mod store;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use store::BlobStore;
