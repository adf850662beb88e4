//! The object store trait

use crate::error::Result;
use crate::types::{TagQuery, Tags};
use async_trait::async_trait;

/// Durable remote tier, keyed by object name.
///
/// Payloads are opaque to the store; callers encrypt before `put`.
/// Tags are kept in cleartext so the store can search them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create or replace `name`, replacing its tags as well
    async fn put(&self, name: &str, data: Vec<u8>, tags: &Tags) -> Result<()>;

    /// Fetch the payload, `None` if the object does not exist
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Remove `name`. Returns whether an object was actually removed;
    /// an already-absent object is not an error.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of every object in the container
    async fn list(&self) -> Result<Vec<String>>;

    /// Replace the tags of an existing object, `NotFound` otherwise
    async fn set_tags(&self, name: &str, tags: &Tags) -> Result<()>;

    /// Tags of `name`, `None` if the object does not exist
    async fn get_tags(&self, name: &str) -> Result<Option<Tags>>;

    /// Names of objects whose tags contain exactly `query.key -> query.value`
    async fn find_by_tag(&self, query: &TagQuery) -> Result<Vec<String>>;
}
