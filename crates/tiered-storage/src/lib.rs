//! Tiered Storage
//!
//! Serves named blobs from two tiers: a fast local cache and a durable
//! remote object store. New uploads always land in the cache; downloads
//! hit the cache first and hydrate it from the remote tier on a miss.
//! Remote payloads are sealed with a [`blob_envelope::Envelope`].
//! A sweep promotes cold cache entries to the remote tier and frees the
//! local copy only after the remote write is confirmed.

pub mod error;
pub mod locks;
pub mod manager;
pub mod sweep;
pub mod types;

pub use error::{ErrorKind, Result, StorageError};
pub use locks::{NameGuard, NameLocks};
pub use manager::TieredStorage;
pub use types::{FileTags, SweepFailure, SweepReport, Tier, TieredStorageConfig};
