//! Blob Vault - tiered, encrypted blob storage over HTTP
//!
//! Uploads land in a local cache directory. Files left idle are sealed and
//! moved to the remote object directory by a background sweep, and pulled
//! back into the cache when they are read again.

mod config;
mod error;
mod server;
mod sweeper;
mod types;

use crate::config::VaultConfig;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use crate::sweeper::spawn_sweeper;
use blob_envelope::Envelope;
use file_blob_cache::BlobCache;
use object_store_client::DirectoryObjectStore;
use std::sync::Arc;
use tiered_storage::TieredStorage;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("blob_vault_server=info".parse()?)
        .add_directive("tiered_storage=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Blob Vault...");

    let config = VaultConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Remote dir: {:?}", config.remote_dir);
    info!("Cold threshold: {} seconds", config.cold_threshold.as_secs());
    info!(
        "Max upload size: {} MB",
        config.max_upload_bytes / (1024 * 1024)
    );

    let cache = BlobCache::new(config.cache_dir.clone());
    cache.init().await?;

    let remote = DirectoryObjectStore::new(config.remote_dir.clone());
    let envelope = Envelope::new(&config.encryption_key);
    let storage = Arc::new(TieredStorage::new(
        cache,
        Arc::new(remote),
        envelope,
        config.storage_config(),
    ));

    match config.sweep_interval {
        Some(every) => {
            spawn_sweeper(storage.clone(), every, config.cold_threshold);
        }
        None => info!("Background sweep disabled"),
    }

    let state: SharedState = Arc::new(ServerState::new(
        storage,
        config.cold_threshold,
        config.max_upload_bytes,
    ));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
