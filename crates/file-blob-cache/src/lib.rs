//! File-based local blob tier with last-access tracking
//!
//! Stores blobs on disk under their own names with in-memory metadata.
//! Every read or write refreshes an entry's last-access time, and cold
//! entries (not accessed within a threshold) can be listed for eviction.

mod cache;
mod error;
mod types;

pub use cache::{validate_name, BlobCache, MAX_NAME_LEN};
pub use error::{CacheError, Result};
pub use types::{CacheEntry, CacheStats, ColdEntry};
