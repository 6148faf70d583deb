//! Non-mutating remote wrapper for previews

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ksync_fs::ContentHash;

use super::{CollectionListing, FileListing, PurgeOutcome, RemoteResult, RemoteStore};

/// Prefix of every id fabricated by [`DryRunRemote`]
pub const DRY_RUN_ID_PREFIX: &str = "dry-run:";

/// Forwards listings to a real remote and turns every mutation into a
/// successful no-op.
///
/// Running the reconciler against this wrapper yields the same
/// classification and counts as a live run without changing remote state.
pub struct DryRunRemote<'a> {
    inner: &'a dyn RemoteStore,
    uploads: AtomicUsize,
}

impl<'a> DryRunRemote<'a> {
    pub fn new(inner: &'a dyn RemoteStore) -> Self {
        Self {
            inner,
            uploads: AtomicUsize::new(0),
        }
    }
}

impl RemoteStore for DryRunRemote<'_> {
    fn list_collections(&self) -> RemoteResult<CollectionListing> {
        self.inner.list_collections()
    }

    fn create_collection(&self, name: &str) -> RemoteResult<String> {
        Ok(format!("{}{}", DRY_RUN_ID_PREFIX, name))
    }

    fn list_files(&self, collection_id: &str) -> RemoteResult<FileListing> {
        if collection_id.starts_with(DRY_RUN_ID_PREFIX) {
            Ok(FileListing::new())
        } else {
            self.inner.list_files(collection_id)
        }
    }

    fn upload_file(&self, _path: &Path) -> RemoteResult<String> {
        let n = self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}upload-{}", DRY_RUN_ID_PREFIX, n))
    }

    fn attach_file(&self, _collection_id: &str, _file_id: &str) -> RemoteResult<()> {
        Ok(())
    }

    fn detach_file(&self, _collection_id: &str, _file_id: &str) -> RemoteResult<()> {
        Ok(())
    }

    fn purge_duplicate_vectors(&self, _hash: &ContentHash) -> PurgeOutcome {
        PurgeOutcome::default()
    }
}
