//! Cold-entry promotion
//!
//! A sweep walks the cache entries idle for at least the threshold, writes
//! each one sealed to the remote tier and drops the local copy once the
//! remote write succeeded. A failed entry stays cached and the sweep moves on.

use crate::error::{Result, StorageError};
use crate::manager::TieredStorage;
use crate::types::{SweepFailure, SweepReport};
use object_store_client::Tags;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

enum Outcome {
    Promoted,
    Skipped(&'static str),
}

impl TieredStorage {
    /// Promote every cache entry idle for at least `threshold`.
    ///
    /// Concurrent calls run one after another.
    pub async fn run_sweep(&self, threshold: Duration) -> SweepReport {
        let _sweeping = self.sweep_lock.lock().await;
        let started = Instant::now();

        let cold = self.cache.cold_entries(threshold).await;
        let mut report = SweepReport {
            scanned: cold.len(),
            ..SweepReport::default()
        };
        debug!(cold = cold.len(), ?threshold, "Sweep started");

        for entry in cold {
            match self.promote_entry(&entry.name, threshold).await {
                Ok(Outcome::Promoted) => report.promoted.push(entry.name),
                Ok(Outcome::Skipped(reason)) => {
                    debug!(name = %entry.name, reason, "Skipped cold entry");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Failed to promote cold entry");
                    report.failed.push(SweepFailure {
                        name: entry.name,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            scanned = report.scanned,
            promoted = report.promoted.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            duration_ms = report.duration_ms,
            "Sweep finished"
        );
        report
    }

    async fn promote_entry(&self, name: &str, threshold: Duration) -> Result<Outcome> {
        let _guard = self.locks.lock(name).await;

        // The entry may have been read, rewritten or deleted since the scan
        match self.cache.age(name).await {
            None => return Ok(self.skip_removed(name).await),
            Some(age) if age < threshold => return Ok(Outcome::Skipped("touched")),
            Some(_) => {}
        }

        let data = match self.cache.peek(name).await.map_err(|source| StorageError::Cache {
            op: "read",
            name: name.to_string(),
            source,
        })? {
            Some(data) => data,
            None => return Ok(self.skip_removed(name).await),
        };

        let tags = self.tags_for_promotion(name).await?;
        self.promote(name, &data, &tags).await?;

        self.cache
            .delete(name)
            .await
            .map_err(|source| StorageError::Cache {
                op: "delete",
                name: name.to_string(),
                source,
            })?;
        self.pending_tags.write().await.remove(name);

        debug!(name, size = data.len(), tags = tags.len(), "Promoted cold entry");
        Ok(Outcome::Promoted)
    }

    async fn skip_removed(&self, name: &str) -> Outcome {
        self.pending_tags.write().await.remove(name);
        Outcome::Skipped("removed")
    }

    /// Pending upload tags, else whatever the remote copy already carries
    async fn tags_for_promotion(&self, name: &str) -> Result<Tags> {
        if let Some(tags) = self.pending_tags.read().await.get(name) {
            return Ok(tags.clone());
        }

        let existing = self
            .remote_call("get_tags", name, self.remote.get_tags(name))
            .await?;
        Ok(existing.unwrap_or_default())
    }
}
