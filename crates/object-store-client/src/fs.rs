//! Directory-backed object store
//!
//! Layout under the root directory:
//! - `objects/<name>`: payload bytes
//! - `tags/<name>`: cleartext JSON tag sidecar
//! - `staging/{objects,tags}/`: partially written files, renamed into place

use crate::error::{ObjectStoreError, Result};
use crate::store::ObjectStore;
use crate::types::{validate_tags, TagQuery, Tags};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct DirectoryObjectStore {
    root: PathBuf,
    /// Set once the directory layout has been created
    container: OnceCell<()>,
}

impl DirectoryObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            container: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn tags_dir(&self) -> PathBuf {
        self.root.join("tags")
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    fn staged_object_path(&self, name: &str) -> PathBuf {
        self.staging_dir().join("objects").join(name)
    }

    fn staged_tags_path(&self, name: &str) -> PathBuf {
        self.staging_dir().join("tags").join(name)
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.objects_dir().join(name))
    }

    fn tags_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.tags_dir().join(name))
    }

    /// Create the directory layout on first use only
    async fn ensure_container(&self) -> Result<()> {
        self.container
            .get_or_try_init(|| async {
                for dir in [
                    self.objects_dir(),
                    self.tags_dir(),
                    self.staging_dir().join("objects"),
                    self.staging_dir().join("tags"),
                ] {
                    fs::create_dir_all(&dir)
                        .await
                        .map_err(|e| unavailable("create container", &dir.to_string_lossy(), e))?;
                }
                info!(root = ?self.root, "Object container ready");
                Ok::<(), ObjectStoreError>(())
            })
            .await?;
        Ok(())
    }

    async fn read_tags(&self, name: &str) -> Result<Tags> {
        let path = self.tags_path(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Tags::new()),
            Err(e) => Err(unavailable("read tags", name, e)),
        }
    }

    /// Sidecar bytes as currently committed, `None` if there is no sidecar
    async fn committed_tags(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.tags_path(name)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable("read tags", name, e)),
        }
    }

    /// Put back the sidecar that a failed commit replaced
    async fn restore_tags(&self, name: &str, previous: Option<Vec<u8>>) -> Result<()> {
        let path = self.tags_path(name)?;
        let restored = match previous {
            Some(bytes) => fs::write(&path, bytes).await,
            None => match fs::remove_file(&path).await {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        restored.map_err(|e| unavailable("restore tags", name, e))
    }

    /// Move staged payload and sidecar into place, sidecar first. A failed
    /// payload rename restores the previous sidecar.
    async fn commit(&self, name: &str, data: &[u8], tags: &Tags) -> Result<()> {
        let staged_object = self.staged_object_path(name);
        let staged_tags = self.staged_tags_path(name);

        fs::write(&staged_object, data)
            .await
            .map_err(|e| unavailable("stage object", name, e))?;
        fs::write(&staged_tags, serde_json::to_vec(tags)?)
            .await
            .map_err(|e| unavailable("stage tags", name, e))?;

        let previous = self.committed_tags(name).await?;
        fs::rename(&staged_tags, self.tags_path(name)?)
            .await
            .map_err(|e| unavailable("commit tags", name, e))?;

        if let Err(e) = fs::rename(&staged_object, self.object_path(name)?).await {
            if let Err(restore) = self.restore_tags(name, previous).await {
                warn!(name, error = %restore, "Failed to restore tag sidecar");
            }
            return Err(unavailable("commit object", name, e));
        }
        Ok(())
    }

    async fn write_tags(&self, name: &str, tags: &Tags) -> Result<()> {
        let path = self.tags_path(name)?;
        let json = serde_json::to_vec(tags)?;
        fs::write(&path, json)
            .await
            .map_err(|e| unavailable("write tags", name, e))
    }
}

/// Reject names that could escape the container directory
fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(ObjectStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn unavailable(op: &str, name: &str, err: std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Unavailable(format!("{} {}: {}", op, name, err))
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn put(&self, name: &str, data: Vec<u8>, tags: &Tags) -> Result<()> {
        validate_tags(tags)?;
        check_name(name)?;
        self.ensure_container().await?;

        if let Err(e) = self.commit(name, &data, tags).await {
            for staged in [self.staged_object_path(name), self.staged_tags_path(name)] {
                let _ = fs::remove_file(&staged).await;
            }
            return Err(e);
        }

        debug!(name, size = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable("read object", name, e)),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.object_path(name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| unavailable("stat object", name, e))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.object_path(name)?;
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(unavailable("delete object", name, e)),
        };

        if let Err(e) = fs::remove_file(self.tags_path(name)?).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(name, error = %e, "Failed to remove tag sidecar");
            }
        }

        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let dir = self.objects_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable("list", &dir.to_string_lossy(), e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable("list", &dir.to_string_lossy(), e))?
        {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!(name = ?raw, "Skipping non UTF-8 object name"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn set_tags(&self, name: &str, tags: &Tags) -> Result<()> {
        validate_tags(tags)?;
        if !self.exists(name).await? {
            return Err(ObjectStoreError::NotFound(name.to_string()));
        }
        self.write_tags(name, tags).await
    }

    async fn get_tags(&self, name: &str) -> Result<Option<Tags>> {
        if !self.exists(name).await? {
            return Ok(None);
        }
        self.read_tags(name).await.map(Some)
    }

    async fn find_by_tag(&self, query: &TagQuery) -> Result<Vec<String>> {
        debug!(filter = %query, "Searching objects by tag");

        let mut found = Vec::new();
        for name in self.list().await? {
            if query.matches(&self.read_tags(&name).await?) {
                found.push(name);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());

        store
            .put("report.pdf", b"%PDF".to_vec(), &tags(&[("kind", "report")]))
            .await
            .unwrap();

        assert!(store.exists("report.pdf").await.unwrap());
        assert_eq!(store.get("report.pdf").await.unwrap(), Some(b"%PDF".to_vec()));
        assert_eq!(
            store.get_tags("report.pdf").await.unwrap(),
            Some(tags(&[("kind", "report")]))
        );
        assert!(dir.path().join("objects/report.pdf").exists());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());

        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(!store.exists("nope").await.unwrap());
        assert_eq!(store.get_tags("nope").await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_tags() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());
        store
            .put("a", b"x".to_vec(), &tags(&[("k", "v")]))
            .await
            .unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!dir.path().join("tags/a").exists());
        assert!(store
            .find_by_tag(&TagQuery::new("k", "v"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_and_find_by_tag() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());
        store
            .put("b", b"2".to_vec(), &tags(&[("env", "prod")]))
            .await
            .unwrap();
        store
            .put("a", b"1".to_vec(), &tags(&[("env", "dev")]))
            .await
            .unwrap();
        store.put("c", b"3".to_vec(), &Tags::new()).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            store.find_by_tag(&TagQuery::new("env", "prod")).await.unwrap(),
            vec!["b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_set_tags() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());

        let err = store.set_tags("ghost", &Tags::new()).await.unwrap_err();
        assert!(err.is_not_found());

        store.put("a", b"1".to_vec(), &Tags::new()).await.unwrap();
        store.set_tags("a", &tags(&[("x", "y")])).await.unwrap();
        assert_eq!(
            store.get_tags("a").await.unwrap(),
            Some(tags(&[("x", "y")]))
        );
    }

    #[tokio::test]
    async fn test_rejects_path_escaping_names() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());

        for name in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            let err = store.put(name, b"x".to_vec(), &Tags::new()).await.unwrap_err();
            assert!(
                matches!(err, ObjectStoreError::InvalidName(_)),
                "accepted {:?}",
                name
            );
        }
    }

    fn staging_is_empty(root: &Path) -> bool {
        ["staging/objects", "staging/tags"].iter().all(|sub| {
            std::fs::read_dir(root.join(sub))
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        })
    }

    #[tokio::test]
    async fn test_longest_name_round_trips() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());
        let name = "x".repeat(255);

        store
            .put(&name, b"long".to_vec(), &tags(&[("k", "v")]))
            .await
            .unwrap();

        assert_eq!(store.get(&name).await.unwrap(), Some(b"long".to_vec()));
        assert_eq!(store.get_tags(&name).await.unwrap(), Some(tags(&[("k", "v")])));
        assert_eq!(
            store.find_by_tag(&TagQuery::new("k", "v")).await.unwrap(),
            vec![name]
        );
        assert!(staging_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_tags() {
        let dir = tempdir().unwrap();
        let store = DirectoryObjectStore::new(dir.path().to_path_buf());
        store
            .put("a", b"v1".to_vec(), &tags(&[("version", "1")]))
            .await
            .unwrap();

        // A directory in the payload's place makes the final rename fail
        std::fs::remove_file(dir.path().join("objects/a")).unwrap();
        std::fs::create_dir(dir.path().join("objects/a")).unwrap();

        let err = store
            .put("a", b"v2".to_vec(), &tags(&[("version", "2")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Unavailable(_)));

        let sidecar = std::fs::read(dir.path().join("tags/a")).unwrap();
        let stored: Tags = serde_json::from_slice(&sidecar).unwrap();
        assert_eq!(stored, tags(&[("version", "1")]));
        assert!(staging_is_empty(dir.path()));
    }
}
