//! Per-collection reconciliation
//!
//! Given the resolved file set of one collection and that collection's
//! cache slice, bring the remote collection in line:
//!
//! 1. locate or create the collection and list its attached files
//! 2. skip files whose cached hash matches and that are still attached
//! 3. purge, upload and attach everything else
//! 4. detach attached files that are no longer resolved
//!
//! Only step 1 can abort the collection. Everything after it is per file.

use std::collections::HashSet;

use ksync_fs::ContentHash;
use tracing::{debug, info, warn};

use super::locks::ContentLocks;
use super::report::{CollectionReport, DiffAction};
use crate::cache::{CacheEntry, CollectionCache};
use crate::definition::ResolvedFile;
use crate::remote::{FileListing, RemoteResult, RemoteStore};
use crate::Result;

/// Reconciles one collection at a time against a [`RemoteStore`].
pub struct Reconciler<'a> {
    remote: &'a dyn RemoteStore,
    locks: &'a ContentLocks,
    force: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(remote: &'a dyn RemoteStore, locks: &'a ContentLocks) -> Self {
        Self {
            remote,
            locks,
            force: false,
        }
    }

    /// Re-upload every resolved file regardless of the cache.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Reconcile `collection` so that it holds exactly `files`.
    ///
    /// `cache` is the collection's slice of the sync cache; it is updated in
    /// place for every successful upload or detach and pruned of entries that
    /// are neither resolved nor attached.
    pub fn reconcile(
        &self,
        collection: &str,
        files: &[ResolvedFile],
        cache: &mut CollectionCache,
    ) -> CollectionReport {
        let (collection_id, attached) = match self.bootstrap(collection) {
            Ok(found) => found,
            Err(e) => {
                warn!(collection, "skipping collection: {}", e);
                return CollectionReport::aborted(collection, e.to_string());
            }
        };

        let mut report = CollectionReport::new(collection);
        report.files_resolved = files.len();

        let mut seen: HashSet<&str> = HashSet::new();
        for file in files {
            seen.insert(&file.file_name);
            match self.sync_file(collection, &collection_id, file, &attached, cache) {
                Ok(action) => report.record(&file.file_name, action),
                Err(e) => {
                    warn!(collection, file = %file.file_name, "sync failed: {}", e);
                    report.fail(&file.file_name, e.to_string());
                }
            }
        }

        for (file_name, file_id) in &attached {
            if seen.contains(file_name.as_str()) {
                continue;
            }
            match self.remote.detach_file(&collection_id, file_id) {
                Ok(()) => {
                    info!(collection, file = %file_name, "removed");
                    cache.remove(file_name);
                    report.record(file_name, DiffAction::Remove);
                }
                Err(e) => {
                    warn!(collection, file = %file_name, "detach failed: {}", e);
                    report.fail(file_name, e.to_string());
                }
            }
        }

        let before = cache.len();
        cache.retain(|name, _| seen.contains(name.as_str()) || attached.contains_key(name));
        if cache.len() < before {
            debug!(collection, pruned = before - cache.len(), "pruned stale cache entries");
        }

        report
    }

    /// Find or create the collection, then list what is attached to it.
    fn bootstrap(&self, collection: &str) -> RemoteResult<(String, FileListing)> {
        let collections = self.remote.list_collections()?;
        let collection_id = match collections.get(collection) {
            Some(id) => id.clone(),
            None => {
                info!(collection, "creating collection");
                self.remote.create_collection(collection)?
            }
        };
        let attached = self.remote.list_files(&collection_id)?;
        debug!(collection, attached = attached.len(), "listed remote files");
        Ok((collection_id, attached))
    }

    fn sync_file(
        &self,
        collection: &str,
        collection_id: &str,
        file: &ResolvedFile,
        attached: &FileListing,
        cache: &mut CollectionCache,
    ) -> Result<DiffAction> {
        let hash = ksync_fs::hash_file(&file.path)?;
        let is_attached = attached.contains_key(&file.file_name);

        let unchanged = cache
            .get(&file.file_name)
            .is_some_and(|entry| entry.matches(&hash) && entry.file_id.is_some());
        if !self.force && unchanged && is_attached {
            debug!(collection, file = %file.file_name, "unchanged");
            return Ok(DiffAction::Skip);
        }

        let action = if is_attached {
            DiffAction::Update
        } else {
            DiffAction::Add
        };

        let _guard = self.locks.acquire(&hash);
        self.remote.purge_duplicate_vectors(&hash);
        let file_id = self.remote.upload_file(&file.path)?;
        self.attach(collection, collection_id, &file_id, &hash)?;

        cache.insert(file.file_name.clone(), CacheEntry::new(&hash, file_id));
        info!(
            collection,
            file = %file.file_name,
            hash = hash.short(),
            "{}",
            if action == DiffAction::Add { "added" } else { "updated" }
        );
        Ok(action)
    }

    /// Attach an uploaded file, recovering once from a duplicate-content
    /// rejection by purging the stale vectors and retrying.
    fn attach(
        &self,
        collection: &str,
        collection_id: &str,
        file_id: &str,
        hash: &ContentHash,
    ) -> RemoteResult<()> {
        match self.remote.attach_file(collection_id, file_id) {
            Err(e) if e.is_duplicate_content() => {
                debug!(collection, hash = hash.short(), "duplicate content, purging and retrying");
                self.remote.purge_duplicate_vectors(hash);
                self.remote.attach_file(collection_id, file_id)
            }
            other => other,
        }
    }
}
