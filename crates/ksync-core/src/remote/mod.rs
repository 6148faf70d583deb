//! Remote knowledge store
//!
//! [`RemoteStore`] is the capability set the reconciler drives. It is
//! implemented by [`HttpRemote`] for a live knowledge API, by
//! [`DryRunRemote`] which forwards reads and swallows writes, and by
//! in-memory fakes in tests.

mod dry_run;
mod http;

pub use dry_run::{DRY_RUN_ID_PREFIX, DryRunRemote};
pub use http::HttpRemote;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ksync_fs::ContentHash;

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Remote collection name → collection id
pub type CollectionListing = BTreeMap<String, String>;

/// File name → remote file id for the files attached to a collection
pub type FileListing = BTreeMap<String, String>;

/// Marker the remote puts in the body when it refuses byte-identical content
const DUPLICATE_CONTENT_MARKER: &str = "duplicate content";

/// Errors returned by remote calls
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Non-2xx response
    #[error("{operation} failed with HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// The remote already holds byte-identical content in its vector store
    #[error("{operation} refused: duplicate content ({body})")]
    DuplicateContent { operation: String, body: String },

    /// Connection failure or timeout
    #[error("{operation} request failed: {message}")]
    Transport { operation: String, message: String },

    /// 2xx response whose body is not the expected shape
    #[error("{operation} returned an unexpected response: {message}")]
    Decode { operation: String, message: String },

    /// A local file could not be read for upload
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Classify a failed response.
    ///
    /// The remote has no dedicated error code for duplicate content, so a
    /// 400 whose body mentions it is recognised by inspection.
    pub fn from_status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let operation = operation.into();
        let body = body.into();
        if status == 400 && body.to_lowercase().contains(DUPLICATE_CONTENT_MARKER) {
            Self::DuplicateContent { operation, body }
        } else {
            Self::Status {
                operation,
                status,
                body,
            }
        }
    }

    pub fn is_duplicate_content(&self) -> bool {
        matches!(self, Self::DuplicateContent { .. })
    }
}

/// What a duplicate-vector purge did.
///
/// Purely informational: a purge is best effort and callers never branch
/// on its outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Backing collections a delete was sent to
    pub attempted: usize,
    /// Backing collections that acknowledged the delete
    pub acknowledged: usize,
}

/// Capabilities of a remote knowledge store.
///
/// All calls block. Implementations must be shareable across the worker
/// threads that reconcile different collections.
pub trait RemoteStore: Send + Sync {
    /// All collections, keyed by name.
    fn list_collections(&self) -> RemoteResult<CollectionListing>;

    /// Create a collection and return its id.
    fn create_collection(&self, name: &str) -> RemoteResult<String>;

    /// Files currently attached to a collection, keyed by file name.
    fn list_files(&self, collection_id: &str) -> RemoteResult<FileListing>;

    /// Upload a file's raw bytes and return the new file id.
    fn upload_file(&self, path: &Path) -> RemoteResult<String>;

    /// Attach an uploaded file to a collection.
    ///
    /// Fails with [`RemoteError::DuplicateContent`] when the backing vector
    /// store already holds identical content, even if the attachment that
    /// created it has since been removed.
    fn attach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()>;

    /// Detach a file from a collection.
    fn detach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()>;

    /// Delete residual vector records for `hash` across all backing
    /// collections. Never fails; see [`PurgeOutcome`].
    fn purge_duplicate_vectors(&self, hash: &ContentHash) -> PurgeOutcome;
}
