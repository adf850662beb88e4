//! The tiered storage manager

use crate::error::{Result, StorageError};
use crate::locks::NameLocks;
use crate::types::{FileTags, Tier, TieredStorageConfig};
use blob_envelope::Envelope;
use file_blob_cache::{validate_name, BlobCache, CacheError, CacheStats};
use futures::stream::{self, StreamExt, TryStreamExt};
use object_store_client::{validate_tags, ObjectStore, ObjectStoreError, TagQuery, Tags};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Name used in error context for container-wide remote calls
const ALL_OBJECTS: &str = "*";

/// Local cache in front of an encrypted remote object store
pub struct TieredStorage {
    pub(crate) cache: BlobCache,
    pub(crate) remote: Arc<dyn ObjectStore>,
    pub(crate) envelope: Envelope,
    pub(crate) locks: NameLocks,
    /// Tags for cached entries that have not reached the remote tier yet
    pub(crate) pending_tags: RwLock<HashMap<String, Tags>>,
    /// Serialises sweeps
    pub(crate) sweep_lock: Mutex<()>,
    pub(crate) config: TieredStorageConfig,
}

impl TieredStorage {
    /// Assemble the manager. `cache` must already be initialised.
    pub fn new(
        cache: BlobCache,
        remote: Arc<dyn ObjectStore>,
        envelope: Envelope,
        config: TieredStorageConfig,
    ) -> Self {
        Self {
            cache,
            remote,
            envelope,
            locks: NameLocks::new(),
            pending_tags: RwLock::new(HashMap::new()),
            sweep_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &TieredStorageConfig {
        &self.config
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Store `data` under `name` in the local cache, replacing any earlier
    /// payload and tags.
    ///
    /// Tags become durable once the object reaches the remote tier. With
    /// `write_through_tagged`, an upload carrying tags is also written to
    /// the remote tier right away. An upload that replaces an object the
    /// remote tier already holds is always written through, so the old tags
    /// stop matching searches. If that write fails the sweep retries it.
    pub async fn upload(&self, name: &str, data: &[u8], tags: Tags) -> Result<()> {
        check_name(name)?;
        validate_tags(&tags).map_err(|e| StorageError::InvalidTags(e.to_string()))?;

        let _guard = self.locks.lock(name).await;

        self.cache
            .write(name, data)
            .await
            .map_err(|e| cache_error("write", name, e))?;

        let write_through = if self.config.write_through_tagged && !tags.is_empty() {
            true
        } else {
            self.remote_holds(name).await
        };

        // Pending tags override whatever the remote tier holds until the
        // next successful put
        if write_through || !tags.is_empty() {
            self.pending_tags
                .write()
                .await
                .insert(name.to_string(), tags.clone());
        } else {
            self.pending_tags.write().await.remove(name);
        }

        if write_through {
            match self.promote(name, data, &tags).await {
                Ok(()) => {
                    self.pending_tags.write().await.remove(name);
                }
                Err(e) => {
                    warn!(name, error = %e, "Write-through failed, leaving upload for the sweep");
                }
            }
        }

        info!(name, size = data.len(), tags = tags.len(), write_through, "Uploaded file");
        Ok(())
    }

    /// Whether the remote tier has a copy of `name`. An unreachable remote
    /// counts as holding it, so the caller keeps overriding its tags.
    async fn remote_holds(&self, name: &str) -> bool {
        match self.remote_call("exists", name, self.remote.exists(name)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(name, error = %e, "Could not check remote tier before upload");
                true
            }
        }
    }

    /// Fetch the bytes stored under `name`
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        self.download_with_source(name)
            .await
            .map(|(data, _)| data)
    }

    /// Fetch the bytes stored under `name` and report which tier served them.
    ///
    /// A cache hit refreshes the entry's recency. On a miss the remote copy
    /// is opened and written back into the cache before returning.
    pub async fn download_with_source(&self, name: &str) -> Result<(Vec<u8>, Tier)> {
        check_name(name)?;
        let _guard = self.locks.lock(name).await;

        if let Some(data) = self
            .cache
            .read(name)
            .await
            .map_err(|e| cache_error("read", name, e))?
        {
            return Ok((data, Tier::Cache));
        }

        // No local copy, so nothing is left for pending tags to describe
        self.pending_tags.write().await.remove(name);

        let data = self.fetch_remote(name).await.map_err(|e| match e {
            StorageError::NotFound(_) => e,
            other => StorageError::DownloadFailed {
                name: name.to_string(),
                source: Box::new(other),
            },
        })?;

        if let Err(e) = self.cache.write(name, &data).await {
            // Serve the bytes anyway; the next download retries the hydrate
            warn!(name, error = %e, "Failed to hydrate cache");
        } else {
            debug!(name, size = data.len(), "Hydrated cache from remote");
        }

        Ok((data, Tier::Remote))
    }

    async fn fetch_remote(&self, name: &str) -> Result<Vec<u8>> {
        if !self.remote_call("exists", name, self.remote.exists(name)).await? {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let sealed = self
            .remote_call("get", name, self.remote.get(name))
            .await?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        self.envelope
            .open(&sealed)
            .map_err(|source| StorageError::Crypto {
                name: name.to_string(),
                source,
            })
    }

    /// Remove `name` from both tiers. `NotFound` if neither tier held it.
    pub async fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let _guard = self.locks.lock(name).await;

        let removed_remote = self
            .remote_call("delete", name, self.remote.delete(name))
            .await?;
        let removed_local = self
            .cache
            .delete(name)
            .await
            .map_err(|e| cache_error("delete", name, e))?;
        self.pending_tags.write().await.remove(name);

        if !removed_remote && !removed_local {
            return Err(StorageError::NotFound(name.to_string()));
        }

        info!(name, removed_remote, removed_local, "Deleted file");
        Ok(())
    }

    /// Every known name: the remote set plus files only in the cache
    pub async fn list(&self) -> Result<Vec<String>> {
        let remote = self
            .remote_call("list", ALL_OBJECTS, self.remote.list())
            .await?;

        let mut names: BTreeSet<String> = remote.into_iter().collect();
        names.extend(self.cache.names().await);
        Ok(names.into_iter().collect())
    }

    /// Every known name with its tags.
    ///
    /// Remote objects report their stored tags (one round trip each, fetched
    /// with bounded concurrency). Cached files with pending tags report those
    /// instead, as they are newer than anything the remote tier holds.
    pub async fn list_with_tags(&self) -> Result<Vec<FileTags>> {
        let remote_names = self
            .remote_call("list", ALL_OBJECTS, self.remote.list())
            .await?;

        let fetched: Vec<Option<FileTags>> = stream::iter(remote_names)
            .map(|name| async move {
                let tags = self
                    .remote_call("get_tags", &name, self.remote.get_tags(&name))
                    .await?;
                Ok::<_, StorageError>(tags.map(|tags| FileTags { name, tags }))
            })
            .buffered(self.config.tag_fetch_concurrency.max(1))
            .try_collect()
            .await?;

        // Objects deleted between the listing and their tag fetch drop out
        let mut files: Vec<FileTags> = fetched.into_iter().flatten().collect();

        let cached: BTreeSet<String> = self.cache.names().await.into_iter().collect();
        let pending = self.pending_tags.read().await;
        for file in files.iter_mut().filter(|f| cached.contains(&f.name)) {
            if let Some(tags) = pending.get(&file.name) {
                file.tags = tags.clone();
            }
        }

        let listed: BTreeSet<String> = files.iter().map(|f| f.name.clone()).collect();
        for name in cached {
            if !listed.contains(&name) {
                let tags = pending.get(&name).cloned().unwrap_or_default();
                files.push(FileTags { name, tags });
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Names whose remote tags contain exactly `key -> value`
    pub async fn search_by_tag(&self, key: &str, value: &str) -> Result<Vec<String>> {
        if key.is_empty() {
            return Err(StorageError::InvalidTags(
                "tag key is required for search".to_string(),
            ));
        }

        let query = TagQuery::new(key, value);
        let filter = query.expression();
        self.remote_call("find_by_tag", &filter, self.remote.find_by_tag(&query))
            .await
    }

    /// Seal `data` and write it to the remote tier with `tags`
    pub(crate) async fn promote(&self, name: &str, data: &[u8], tags: &Tags) -> Result<()> {
        let sealed = self
            .envelope
            .seal(data)
            .map_err(|source| StorageError::Crypto {
                name: name.to_string(),
                source,
            })?;

        self.remote_call("put", name, self.remote.put(name, sealed, tags))
            .await
    }

    /// Run a remote call under the configured timeout, wrapping failures
    pub(crate) async fn remote_call<T, F>(&self, op: &'static str, name: &str, call: F) -> Result<T>
    where
        F: Future<Output = object_store_client::Result<T>>,
    {
        let after = self.config.remote_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result.map_err(|source| remote_error(op, name, source)),
            Err(_) => {
                warn!(op, name, ?after, "Remote call timed out");
                Err(StorageError::Timeout {
                    op,
                    name: name.to_string(),
                    after,
                })
            }
        }
    }
}

fn check_name(name: &str) -> Result<()> {
    validate_name(name).map_err(|_| StorageError::InvalidName(name.to_string()))
}

fn cache_error(op: &'static str, name: &str, source: CacheError) -> StorageError {
    StorageError::Cache {
        op,
        name: name.to_string(),
        source,
    }
}

fn remote_error(op: &'static str, name: &str, source: ObjectStoreError) -> StorageError {
    StorageError::Remote {
        op,
        name: name.to_string(),
        source,
    }
}
