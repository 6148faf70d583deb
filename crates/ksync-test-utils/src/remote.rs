//! [`FakeRemote`]: in-memory knowledge API for reconciliation tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ksync_core::remote::{
    CollectionListing, FileListing, PurgeOutcome, RemoteError, RemoteResult, RemoteStore,
};
use ksync_fs::ContentHash;

/// One call received by a [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCollections,
    CreateCollection(String),
    ListFiles(String),
    /// File name of the uploaded path
    Upload(String),
    Attach { collection_id: String, file_id: String },
    Detach { collection_id: String, file_id: String },
    /// Full hex content hash
    Purge(String),
}

impl Call {
    /// Whether the call changes remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::ListCollections | Self::ListFiles(_))
    }
}

#[derive(Debug, Default)]
struct State {
    /// collection name -> collection id
    collections: BTreeMap<String, String>,
    /// collection id -> (file name -> file id)
    attached: BTreeMap<String, BTreeMap<String, String>>,
    /// file id -> file name
    uploads: BTreeMap<String, String>,
    next_id: usize,
    calls: Vec<Call>,

    duplicate_rejections: usize,
    failing_uploads: BTreeSet<String>,
    failing_detaches: BTreeSet<String>,
    fail_list_collections: bool,
    fail_create: bool,
    fail_list_files: bool,
    /// collection name -> delay before its file listing fails
    stalled_listings: BTreeMap<String, Duration>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory [`RemoteStore`].
///
/// Clones share state, so a test can hand one clone to the engine and keep
/// another to inspect calls and attachments afterwards.
#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
}

fn server_error(operation: &str) -> RemoteError {
    RemoteError::from_status(operation, 500, "internal error")
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Create a collection without journaling the call.
    pub fn seed_collection(&self, name: &str) -> String {
        let mut state = self.state();
        if let Some(id) = state.collections.get(name) {
            return id.clone();
        }
        let id = state.next_id("kb");
        state.collections.insert(name.to_string(), id.clone());
        state.attached.insert(id.clone(), BTreeMap::new());
        id
    }

    /// Attach a file to a collection without journaling the call.
    pub fn seed_file(&self, collection: &str, file_name: &str) -> String {
        let collection_id = self.seed_collection(collection);
        let mut state = self.state();
        let file_id = state.next_id("file");
        state.uploads.insert(file_id.clone(), file_name.to_string());
        state
            .attached
            .entry(collection_id)
            .or_default()
            .insert(file_name.to_string(), file_id.clone());
        file_id
    }

    /// Reject the next `times` attach calls as duplicate content.
    pub fn reject_attach_as_duplicate(&self, times: usize) {
        self.state().duplicate_rejections = times;
    }

    /// Fail every upload of a file with this name.
    pub fn fail_upload_of(&self, file_name: &str) {
        self.state().failing_uploads.insert(file_name.to_string());
    }

    /// Fail every detach of a file with this name.
    pub fn fail_detach_of(&self, file_name: &str) {
        self.state().failing_detaches.insert(file_name.to_string());
    }

    pub fn fail_list_collections(&self) {
        self.state().fail_list_collections = true;
    }

    pub fn fail_create_collection(&self) {
        self.state().fail_create = true;
    }

    pub fn fail_list_files(&self) {
        self.state().fail_list_files = true;
    }

    /// Make listing one collection's files block for `delay` and then fail,
    /// leaving other collections free to proceed meanwhile.
    pub fn stall_then_fail_list_files(&self, collection: &str, delay: Duration) {
        self.state().stalled_listings.insert(collection.to_string(), delay);
    }

    /// Files attached to the named collection, file name -> file id.
    pub fn attached(&self, collection: &str) -> BTreeMap<String, String> {
        let state = self.state();
        state
            .collections
            .get(collection)
            .and_then(|id| state.attached.get(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.state().collections.contains_key(name)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of journaled calls that change remote state.
    pub fn mutation_count(&self) -> usize {
        self.state().calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn uploads_of(&self, file_name: &str) -> usize {
        self.count(|c| matches!(c, Call::Upload(name) if name == file_name))
    }

    pub fn attach_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Attach { .. }))
    }

    pub fn detach_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Detach { .. }))
    }

    pub fn purges_of(&self, hash: &ContentHash) -> usize {
        self.count(|c| matches!(c, Call::Purge(h) if h == hash.as_str()))
    }
}

impl RemoteStore for FakeRemote {
    fn list_collections(&self) -> RemoteResult<CollectionListing> {
        let mut state = self.state();
        state.calls.push(Call::ListCollections);
        if state.fail_list_collections {
            return Err(server_error("list collections"));
        }
        Ok(state.collections.clone())
    }

    fn create_collection(&self, name: &str) -> RemoteResult<String> {
        let mut state = self.state();
        state.calls.push(Call::CreateCollection(name.to_string()));
        if state.fail_create {
            return Err(server_error("create collection"));
        }
        let id = state.next_id("kb");
        state.collections.insert(name.to_string(), id.clone());
        state.attached.insert(id.clone(), BTreeMap::new());
        Ok(id)
    }

    fn list_files(&self, collection_id: &str) -> RemoteResult<FileListing> {
        let mut state = self.state();
        state.calls.push(Call::ListFiles(collection_id.to_string()));
        let stalled = state
            .collections
            .iter()
            .find(|(_, id)| id.as_str() == collection_id)
            .and_then(|(name, _)| state.stalled_listings.get(name).copied());
        if let Some(delay) = stalled {
            drop(state);
            std::thread::sleep(delay);
            return Err(RemoteError::from_status("list collection files", 503, "unavailable"));
        }
        if state.fail_list_files {
            return Err(server_error("list collection files"));
        }
        Ok(state.attached.get(collection_id).cloned().unwrap_or_default())
    }

    fn upload_file(&self, path: &Path) -> RemoteResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut state = self.state();
        state.calls.push(Call::Upload(file_name.clone()));
        if state.failing_uploads.contains(&file_name) {
            return Err(server_error("upload"));
        }
        std::fs::metadata(path).map_err(|source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_id = state.next_id("file");
        state.uploads.insert(file_id.clone(), file_name);
        Ok(file_id)
    }

    fn attach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Attach {
            collection_id: collection_id.to_string(),
            file_id: file_id.to_string(),
        });
        if state.duplicate_rejections > 0 {
            state.duplicate_rejections -= 1;
            return Err(RemoteError::from_status(
                "attach file",
                400,
                "Duplicate content detected. Please provide unique content to proceed.",
            ));
        }
        let Some(file_name) = state.uploads.get(file_id).cloned() else {
            return Err(RemoteError::from_status("attach file", 404, "file not found"));
        };
        state
            .attached
            .entry(collection_id.to_string())
            .or_default()
            .insert(file_name, file_id.to_string());
        Ok(())
    }

    fn detach_file(&self, collection_id: &str, file_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Detach {
            collection_id: collection_id.to_string(),
            file_id: file_id.to_string(),
        });
        let file_name = state.uploads.get(file_id).cloned().unwrap_or_default();
        if state.failing_detaches.contains(&file_name) {
            return Err(server_error("detach file"));
        }
        if let Some(files) = state.attached.get_mut(collection_id) {
            files.retain(|_, id| id != file_id);
        }
        Ok(())
    }

    fn purge_duplicate_vectors(&self, hash: &ContentHash) -> PurgeOutcome {
        self.state().calls.push(Call::Purge(hash.as_str().to_string()));
        PurgeOutcome {
            attempted: 2,
            acknowledged: 2,
        }
    }
}
