//! Reports produced by a sync pass

use std::ops::AddAssign;

use serde::Serialize;

/// What the reconciler decided for one file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    /// Cached, unchanged, and still attached remotely
    Skip,
    /// Not present in the remote listing
    Add,
    /// Present in the remote listing but changed or forced
    Update,
    /// Attached remotely but no longer resolved locally
    Remove,
}

/// A completed action on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAction {
    pub file_name: String,
    pub action: DiffAction,
}

/// A file left unsynced for this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub message: String,
}

/// How far a collection's sync got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Files were processed (individual files may still have failed)
    Synced,
    /// No reference resolved, so the remote was not touched
    Unavailable,
    /// The collection could not be located, created, or listed
    Aborted { reason: String },
}

/// Added/updated/removed totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl SyncCounts {
    pub fn is_zero(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

impl AddAssign for SyncCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

/// Result of reconciling one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    #[serde(flatten)]
    pub status: CollectionStatus,
    pub files_resolved: usize,
    pub actions: Vec<FileAction>,
    pub failures: Vec<FileFailure>,
    pub warnings: Vec<String>,
}

impl CollectionReport {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            status: CollectionStatus::Synced,
            files_resolved: 0,
            actions: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn aborted(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: CollectionStatus::Aborted {
                reason: reason.into(),
            },
            ..Self::new(collection)
        }
    }

    pub fn record(&mut self, file_name: impl Into<String>, action: DiffAction) {
        self.actions.push(FileAction {
            file_name: file_name.into(),
            action,
        });
    }

    pub fn fail(&mut self, file_name: impl Into<String>, message: impl Into<String>) {
        self.failures.push(FileFailure {
            file_name: file_name.into(),
            message: message.into(),
        });
    }

    /// Action recorded for a file name, if any.
    pub fn action_for(&self, file_name: &str) -> Option<DiffAction> {
        self.actions
            .iter()
            .find(|a| a.file_name == file_name)
            .map(|a| a.action)
    }

    fn count(&self, action: DiffAction) -> usize {
        self.actions.iter().filter(|a| a.action == action).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(DiffAction::Skip)
    }

    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            added: self.count(DiffAction::Add),
            updated: self.count(DiffAction::Update),
            removed: self.count(DiffAction::Remove),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, CollectionStatus::Aborted { .. })
    }
}

/// Result of one pass over a set of collections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub collections: Vec<CollectionReport>,
}

impl SyncReport {
    pub fn totals(&self) -> SyncCounts {
        let mut totals = SyncCounts::default();
        for collection in &self.collections {
            totals += collection.counts();
        }
        totals
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == name)
    }

    pub fn failure_count(&self) -> usize {
        self.collections.iter().map(|c| c.failures.len()).sum()
    }

    /// True unless some collection could not be bootstrapped.
    pub fn success(&self) -> bool {
        !self.collections.iter().any(CollectionReport::is_aborted)
    }
}
