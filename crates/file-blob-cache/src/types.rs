//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Metadata for a cached blob entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    /// Time since the last read or write, zero if the clock went backwards
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_accessed).to_std().unwrap_or(Duration::ZERO)
    }
}

/// An entry whose last access is older than the eviction threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdEntry {
    pub name: String,
    pub age: Duration,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
