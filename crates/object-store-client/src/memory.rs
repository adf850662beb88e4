//! In-memory object store
//!
//! Keeps objects in a shared map. Clones share the same storage, so a test
//! can hand one clone to the code under test and inspect the other. Call
//! counters and fault injection make it usable as the remote-tier fake.

use crate::error::{ObjectStoreError, Result};
use crate::store::ObjectStore;
use crate::types::{validate_tags, TagQuery, Tags};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    tags: Tags,
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    failing_puts: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
}

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    faults: Arc<Faults>,
    gets: Arc<AtomicU64>,
    puts: Arc<AtomicU64>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of successful `put` calls so far
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Stored payload for `name` exactly as it was put, bypassing counters
    pub async fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(name).map(|o| o.data.clone())
    }

    /// Make every operation fail with `Unavailable` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Make `put` fail for `name` only
    pub fn fail_puts_for(&self, name: &str) {
        if let Ok(mut failing) = self.faults.failing_puts.lock() {
            failing.insert(name.to_string());
        }
    }

    /// Delay every operation by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.faults.latency.lock() {
            *current = latency;
        }
    }

    async fn check(&self, op: &str) -> Result<()> {
        let latency = self.faults.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.faults.unavailable.load(Ordering::Relaxed) {
            return Err(ObjectStoreError::Unavailable(format!(
                "{} rejected: store offline",
                op
            )));
        }
        Ok(())
    }

    fn put_should_fail(&self, name: &str) -> bool {
        self.faults
            .failing_puts
            .lock()
            .map(|failing| failing.contains(name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, name: &str, data: Vec<u8>, tags: &Tags) -> Result<()> {
        self.check("put").await?;
        validate_tags(tags)?;

        if self.put_should_fail(name) {
            return Err(ObjectStoreError::Unavailable(format!(
                "put rejected for {}",
                name
            )));
        }

        let size = data.len();
        self.objects.write().await.insert(
            name.to_string(),
            StoredObject {
                data,
                tags: tags.clone(),
            },
        );
        self.puts.fetch_add(1, Ordering::Relaxed);
        debug!(name, size, "Stored object in memory");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.check("get").await?;
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.objects.read().await.get(name).map(|o| o.data.clone()))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.check("exists").await?;
        Ok(self.objects.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.check("delete").await?;
        Ok(self.objects.write().await.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.check("list").await?;
        let mut names: Vec<String> = self.objects.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_tags(&self, name: &str, tags: &Tags) -> Result<()> {
        self.check("set_tags").await?;
        validate_tags(tags)?;

        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(name)
            .ok_or_else(|| ObjectStoreError::NotFound(name.to_string()))?;
        object.tags = tags.clone();
        Ok(())
    }

    async fn get_tags(&self, name: &str) -> Result<Option<Tags>> {
        self.check("get_tags").await?;
        Ok(self.objects.read().await.get(name).map(|o| o.tags.clone()))
    }

    async fn find_by_tag(&self, query: &TagQuery) -> Result<Vec<String>> {
        self.check("find_by_tag").await?;
        debug!(filter = %query, "Searching objects by tag");

        let mut names: Vec<String> = self
            .objects
            .read()
            .await
            .iter()
            .filter(|(_, o)| query.matches(&o.tags))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
