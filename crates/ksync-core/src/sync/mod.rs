//! Reconciliation of collections against the remote

mod engine;
mod locks;
mod reconciler;
mod report;

pub use engine::{SyncEngine, SyncOptions};
pub use locks::{ContentGuard, ContentLocks};
pub use reconciler::Reconciler;
pub use report::{
    CollectionReport, CollectionStatus, DiffAction, FileAction, FileFailure, SyncCounts, SyncReport,
};
