//! Object Store Client
//!
//! The narrow interface the tiered storage core uses to reach the durable
//! remote tier: put/get/exists/delete/list plus cleartext tags and
//! exact-match tag search. Ships an in-memory backend and a directory
//! backend for deployments that mount durable storage.

pub mod error;
pub mod fs;
pub mod memory;
pub mod store;
pub mod types;

pub use error::{ObjectStoreError, Result};
pub use fs::DirectoryObjectStore;
pub use memory::MemoryObjectStore;
pub use store::ObjectStore;
pub use types::{validate_tags, TagQuery, Tags, MAX_TAGS, MAX_TAG_KEY_LEN, MAX_TAG_VALUE_LEN};
