//! File-based blob caching with in-memory metadata

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheStats, ColdEntry};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Longest accepted file name, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Subdirectory holding partially written files
const STAGING_DIR: &str = ".staging";

/// Check that `name` is usable as a plain file name inside the cache directory
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && name != STAGING_DIR
        && !name.contains(['/', '\\', '\0']);

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}

/// A blob cache with in-memory metadata and file-based storage
pub struct BlobCache {
    /// In-memory metadata for cached entries, keyed by file name
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    /// Directory where cached blobs are stored
    cache_dir: PathBuf,
    /// Current total size of cached blobs
    current_size: Arc<AtomicU64>,
    /// Sequence for unique staging file names
    staging_seq: AtomicU64,
    /// Cache hit counter
    hits: Arc<AtomicU64>,
    /// Cache miss counter
    misses: Arc<AtomicU64>,
}

impl BlobCache {
    /// Create a new blob cache
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            cache_dir,
            current_size: Arc::new(AtomicU64::new(0)),
            staging_seq: AtomicU64::new(0),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join(STAGING_DIR)
    }

    /// Initialize the cache directory and rebuild metadata from the files
    /// already present. Last access is seeded from each file's mtime.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;

        // Anything left in staging is from an interrupted write
        let staging = self.staging_dir();
        if let Err(e) = fs::remove_dir_all(&staging).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = ?staging, error = %e, "Failed to clear staging directory");
            }
        }
        fs::create_dir_all(&staging).await?;

        let mut recovered = HashMap::new();
        let mut total_size = 0u64;
        let mut dir = fs::read_dir(&self.cache_dir).await?;

        while let Some(item) = dir.next_entry().await? {
            let metadata = item.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let name = match item.file_name().into_string() {
                Ok(name) if validate_name(&name).is_ok() => name,
                other => {
                    warn!(name = ?other, "Skipping unrecognised file in cache directory");
                    continue;
                }
            };

            let last_accessed = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            total_size += metadata.len();
            recovered.insert(
                name,
                CacheEntry {
                    path: item.path(),
                    size: metadata.len(),
                    last_accessed,
                },
            );
        }

        let count = recovered.len();
        *self.entries.write().await = recovered;
        self.current_size.store(total_size, Ordering::Relaxed);

        info!(cache_dir = ?self.cache_dir, entries = count, total_size, "Cache initialized");
        Ok(())
    }

    /// Read a blob, refreshing its last access. `None` means a miss.
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let data = self.load(name).await?;

        match data {
            Some(data) => {
                if let Some(entry) = self.entries.write().await.get_mut(name) {
                    entry.last_accessed = Utc::now();
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(name, "Cache hit");
                Ok(Some(data))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(name, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Read a blob without counting it as an access
    pub async fn peek(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.load(name).await
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        validate_name(name)?;

        let path = {
            let entries = self.entries.read().await;
            match entries.get(name) {
                Some(entry) => entry.path.clone(),
                None => return Ok(None),
            }
        };

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(name, "Cached file vanished from disk, dropping entry");
                self.forget(name).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store a blob under `name`, replacing any existing file
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        validate_name(name)?;
        let size = data.len() as u64;

        // Stage then rename so readers never see a partial file
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        let staged = self.staging_dir().join(format!("{}.part", seq));
        let path = self.cache_dir.join(name);

        fs::write(&staged, data).await?;
        if let Err(e) = fs::rename(&staged, &path).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }

        let entry = CacheEntry {
            path,
            size,
            last_accessed: Utc::now(),
        };

        let previous = {
            let mut entries = self.entries.write().await;
            entries.insert(name.to_string(), entry)
        };

        if let Some(previous) = previous {
            self.current_size.fetch_sub(previous.size, Ordering::Relaxed);
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);
        debug!(name, size, "Cached blob");

        Ok(())
    }

    /// Remove a blob. Returns whether anything was removed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        validate_name(name)?;

        let path = match self.entries.read().await.get(name) {
            Some(entry) => entry.path.clone(),
            None => return Ok(false),
        };

        // Keep the entry tracked while the file is still on disk
        match fs::remove_file(&path).await {
            Ok(()) => debug!(name, "Removed cached blob"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.forget(name).await;
        Ok(true)
    }

    /// Drop an entry's metadata, returning it
    async fn forget(&self, name: &str) -> Option<CacheEntry> {
        let entry = {
            let mut entries = self.entries.write().await;
            entries.remove(name)
        };

        if let Some(ref entry) = entry {
            self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
        }
        entry
    }

    /// Entries not accessed within `threshold`, oldest first
    pub async fn cold_entries(&self, threshold: Duration) -> Vec<ColdEntry> {
        let now = Utc::now();
        let entries = self.entries.read().await;

        let mut cold: Vec<ColdEntry> = entries
            .iter()
            .map(|(name, entry)| ColdEntry {
                name: name.clone(),
                age: entry.age(now),
            })
            .filter(|entry| entry.age >= threshold)
            .collect();

        cold.sort_by(|a, b| b.age.cmp(&a.age));
        cold
    }

    /// Time since `name` was last read or written
    pub async fn age(&self, name: &str) -> Option<Duration> {
        let now = Utc::now();
        self.entries.read().await.get(name).map(|e| e.age(now))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// Names of every cached blob, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            total_size: self.current_size.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn new_cache(dir: &Path) -> BlobCache {
        let cache = BlobCache::new(dir.to_path_buf());
        cache.init().await.unwrap();
        cache
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name(".hidden").is_ok());
        assert!(validate_name("with spaces & symbols!").is_ok());

        for bad in ["", ".", "..", ".staging", "a/b", "../x", "a\\b", "nul\0"] {
            assert!(validate_name(bad).is_err(), "accepted {:?}", bad);
        }
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_cache_write_and_read() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("hello.txt", b"Hello, world!").await.unwrap();

        let data = cache.read("hello.txt").await.unwrap();
        assert_eq!(data, Some(b"Hello, world!".to_vec()));
        assert!(dir.path().join("hello.txt").exists());
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        assert_eq!(cache.read("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_contents_and_size() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"0123456789").await.unwrap();
        cache.write("a", b"abc").await.unwrap();

        assert_eq!(cache.read("a").await.unwrap(), Some(b"abc".to_vec()));
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"data").await.unwrap();
        assert!(cache.delete("a").await.unwrap());
        assert!(!dir.path().join("a").exists());
        assert_eq!(cache.read("a").await.unwrap(), None);

        // Absent is a no-op
        assert!(!cache.delete("a").await.unwrap());
        assert_eq!(cache.stats().await.total_size, 0);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entry() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"data").await.unwrap();
        // A directory in the file's place makes the removal fail
        std::fs::remove_file(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        assert!(matches!(cache.delete("a").await, Err(CacheError::Io(_))));
        assert!(cache.contains("a").await);
        assert_eq!(cache.stats().await.total_size, 4);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size, 0);

        cache.write("test", b"test data").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 9); // "test data" = 9 bytes
    }

    #[tokio::test]
    async fn test_cache_hit_miss_counters() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        // Miss
        cache.read("test").await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        // Write and hit
        cache.write("test", b"data").await.unwrap();
        cache.read("test").await.unwrap();

        // Peeking is not an access
        cache.peek("test").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_cold_entries() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("old", b"1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        cache.write("new", b"2").await.unwrap();

        let cold = cache.cold_entries(Duration::from_millis(200)).await;
        assert_eq!(cold.len(), 1);
        assert_eq!(cold[0].name, "old");
        assert!(cold[0].age >= Duration::from_millis(200));

        // A zero threshold makes everything cold, oldest first
        let all = cache.cold_entries(Duration::ZERO).await;
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_read_refreshes_last_access() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        cache.read("a").await.unwrap();

        assert!(cache.cold_entries(Duration::from_millis(200)).await.is_empty());
    }

    #[tokio::test]
    async fn test_peek_does_not_refresh_last_access() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.peek("a").await.unwrap(), Some(b"1".to_vec()));

        assert_eq!(cache.cold_entries(Duration::from_millis(200)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_init_recovers_existing_files() {
        let dir = tempdir().unwrap();
        {
            let cache = new_cache(dir.path()).await;
            cache.write("kept.bin", b"12345").await.unwrap();
        }
        std::fs::write(dir.path().join(STAGING_DIR).join("7.part"), b"junk").unwrap();

        let cache = new_cache(dir.path()).await;
        assert_eq!(cache.names().await, vec!["kept.bin".to_string()]);
        assert_eq!(cache.read("kept.bin").await.unwrap(), Some(b"12345".to_vec()));
        assert_eq!(cache.stats().await.total_size, 5);
        assert!(!dir.path().join(STAGING_DIR).join("7.part").exists());
    }

    #[tokio::test]
    async fn test_vanished_file_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        cache.write("a", b"1").await.unwrap();
        std::fs::remove_file(dir.path().join("a")).unwrap();

        assert_eq!(cache.read("a").await.unwrap(), None);
        assert!(!cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_rejects_invalid_names() {
        let dir = tempdir().unwrap();
        let cache = new_cache(dir.path()).await;

        assert!(matches!(
            cache.write("../escape", b"x").await,
            Err(CacheError::InvalidName(_))
        ));
        assert!(matches!(
            cache.read("a/b").await,
            Err(CacheError::InvalidName(_))
        ));
    }
}
