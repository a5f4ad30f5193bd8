//! Object-storage capability.
//!
//! The pipeline addresses storage through hierarchical keys with two
//! sibling roots: raw source objects under `source/...` and derived
//! twins under `extracted/...` (see [`crate::paths`]). The backend is a
//! capability: [`FsObjectStore`] keeps objects in a local directory tree,
//! [`MemoryObjectStore`] backs tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub type Tags = BTreeMap<String, String>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], tags: &Tags) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
    /// All keys under a prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Filesystem store
// ═══════════════════════════════════════════════════════════════════════

/// Directory-backed object store. Keys map to relative paths under the
/// root; tags are persisted as JSON sidecars under `.tags/` so they never
/// appear in listings.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        // Reject path traversal; keys are always forward-slash relative.
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|c| c == ".." || c.is_empty())
        {
            return Err(Error::store(key, "invalid object key"));
        }
        Ok(self.root.join(key))
    }

    fn tag_path(&self, key: &str) -> PathBuf {
        self.root.join(".tags").join(format!("{}.json", key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], tags: &Tags) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        if !tags.is_empty() {
            let tag_path = self.tag_path(key);
            if let Some(parent) = tag_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&tag_path, serde_json::to_vec_pretty(tags)?).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::store(key, e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::store(key, e.to_string())),
        }
        // Tag sidecar may or may not exist.
        let _ = tokio::fs::remove_file(self.tag_path(key)).await;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let wanted = prefix.to_string();
        // walkdir is blocking; keep it off the async executor.
        let keys = tokio::task::spawn_blocking(move || list_keys(&root, &wanted))
            .await
            .map_err(|e| Error::store(prefix, e.to_string()))??;
        Ok(keys)
    }
}

fn list_keys(root: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    if !root.exists() {
        return Ok(keys);
    }
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| Error::store(prefix, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::store(prefix, e.to_string()))?;
        let key = rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
        if key.starts_with(".tags/") {
            continue;
        }
        if key.starts_with(prefix) {
            keys.push(key);
        }
    }
    keys.sort();
    Ok(keys)
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    tags: Tags,
}

/// In-memory object store for tests and dry runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags recorded for a key, if the object exists. Test hook.
    pub fn tags(&self, key: &str) -> Option<Tags> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.tags.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], tags: &Tags) -> Result<()> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                tags: tags.clone(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| Error::store(key, "no such object"))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_of(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn fs_store_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(tmp.path());

        let tags = tags_of(&[("partition", "docs")]);
        store
            .put("source/docs/a/b.txt", b"hello", &tags)
            .await
            .unwrap();

        assert!(store.exists("source/docs/a/b.txt").await.unwrap());
        assert_eq!(store.get("source/docs/a/b.txt").await.unwrap(), b"hello");

        let keys = store.list("source/").await.unwrap();
        assert_eq!(keys, vec!["source/docs/a/b.txt".to_string()]);

        store.delete("source/docs/a/b.txt").await.unwrap();
        assert!(!store.exists("source/docs/a/b.txt").await.unwrap());
        // Deleting again is fine.
        store.delete("source/docs/a/b.txt").await.unwrap();
    }

    #[tokio::test]
    async fn fs_store_listing_excludes_tag_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(tmp.path());
        store
            .put("source/docs/x.txt", b"x", &tags_of(&[("a", "b")]))
            .await
            .unwrap();

        let all = store.list("").await.unwrap();
        assert_eq!(all, vec!["source/docs/x.txt".to_string()]);
    }

    #[tokio::test]
    async fn fs_store_rejects_traversal_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(tmp.path());
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("/abs", b"", &Tags::new()).await.is_err());
        assert!(store.put("a//b", b"", &Tags::new()).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_records_tags() {
        let store = MemoryObjectStore::new();
        store
            .put("extracted/docs/x.json", b"{}", &tags_of(&[("twin-type", "extracted-json")]))
            .await
            .unwrap();
        let tags = store.tags("extracted/docs/x.json").unwrap();
        assert_eq!(tags["twin-type"], "extracted-json");
    }
}
