//! Periodic promotion of cold cache entries

use std::sync::Arc;
use std::time::Duration;
use tiered_storage::TieredStorage;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Run a sweep every `every`, promoting entries idle for `threshold`
pub fn spawn_sweeper(
    storage: Arc<TieredStorage>,
    every: Duration,
    threshold: Duration,
) -> JoinHandle<()> {
    info!(?every, ?threshold, "Starting background sweeper");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = storage.run_sweep(threshold).await;
            if !report.failed.is_empty() {
                warn!(
                    failed = report.failed.len(),
                    promoted = report.promoted.len(),
                    "Background sweep left entries in the cache"
                );
            }
        }
    })
}
