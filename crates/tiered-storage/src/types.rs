//! Tiered storage types

use object_store_client::Tags;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction-time settings for [`crate::TieredStorage`]
#[derive(Debug, Clone)]
pub struct TieredStorageConfig {
    /// Upper bound on any single remote call
    pub remote_timeout: Duration,
    /// Also write uploads that carry tags straight to the remote tier
    pub write_through_tagged: bool,
    /// Concurrent tag fetches when listing with tags
    pub tag_fetch_concurrency: usize,
}

impl Default for TieredStorageConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(30),
            write_through_tagged: true,
            tag_fetch_concurrency: 8,
        }
    }
}

/// Which tier served a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cache,
    Remote,
}

/// A file name with its tag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTags {
    pub name: String,
    pub tags: Tags,
}

/// A cold entry the sweep could not promote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Cold entries found by the scan
    pub scanned: usize,
    /// Names moved to the remote tier and removed locally
    pub promoted: Vec<String>,
    /// Entries touched or removed between the scan and their turn
    pub skipped: usize,
    pub failed: Vec<SweepFailure>,
    pub duration_ms: u64,
}
