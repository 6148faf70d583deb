//! Persistent sync cache
//!
//! Records, per collection and file name, the content hash last synced and
//! the remote file id it was attached as. The cache is advisory: losing it
//! costs a re-upload, never correctness, so absence and corruption both
//! start from an empty cache.
//!
//! On disk it is a JSON object:
//!
//! ```json
//! { "handbook": { "intro.md": { "hash": "9f86d0...", "file_id": "f-123" } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ksync_fs::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;

/// Last synced state of one file within one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl CacheEntry {
    pub fn new(hash: &ContentHash, file_id: impl Into<String>) -> Self {
        Self {
            hash: hash.as_str().to_string(),
            file_id: Some(file_id.into()),
        }
    }

    pub fn matches(&self, hash: &ContentHash) -> bool {
        self.hash == hash.as_str()
    }
}

/// Cache entries of one collection, keyed by file name.
pub type CollectionCache = BTreeMap<String, CacheEntry>;

/// Durable mapping (collection, file name) → [`CacheEntry`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    collections: BTreeMap<String, CollectionCache>,
}

impl CacheStore {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            collections: BTreeMap::new(),
        }
    }

    /// Load the cache from `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or malformed
    /// file is logged and also yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "no sync cache yet, starting empty");
            return Self::empty(path);
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<BTreeMap<String, CollectionCache>>(&content)
                    .map_err(|e| e.to_string())
            });

        match parsed {
            Ok(collections) => Self { path, collections },
            Err(e) => {
                warn!(path = %path.display(), "could not load sync cache, starting empty: {}", e);
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, collection: &str, file_name: &str) -> Option<&CacheEntry> {
        self.collections.get(collection)?.get(file_name)
    }

    pub fn insert(&mut self, collection: &str, file_name: &str, entry: CacheEntry) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(file_name.to_string(), entry);
    }

    pub fn remove(&mut self, collection: &str, file_name: &str) -> Option<CacheEntry> {
        self.collections.get_mut(collection)?.remove(file_name)
    }

    /// Entries of one collection, if it has any.
    pub fn collection(&self, collection: &str) -> Option<&CollectionCache> {
        self.collections.get(collection)
    }

    /// Replace a collection's entries after reconciliation.
    pub fn put_collection(&mut self, collection: &str, entries: CollectionCache) {
        if entries.is_empty() {
            self.collections.remove(collection);
        } else {
            self.collections.insert(collection.to_string(), entries);
        }
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the whole cache back to disk, creating parent directories.
    pub fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.collections)?;
        ksync_fs::io::write_atomic(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), entries = self.len(), "persisted sync cache");
        Ok(())
    }
}
