//! Core of the knowledge sync tool
//!
//! This crate turns a directory of definition documents into remote
//! knowledge collections:
//!
//! - **Definitions**: each `*.md` in the knowledge root names a collection
//!   and lists the files and directories that belong in it
//! - **Filtering**: `config.md` narrows directory expansion by extension and
//!   exclusion glob
//! - **Cache**: content hashes of what was last synced, so unchanged files
//!   are never re-uploaded
//! - **Reconciliation**: add, update and remove remote files until each
//!   collection mirrors its definition
//! - **Watch**: poll for changes and re-sync only what moved
//!
//! # Architecture
//!
//! ```text
//!                  ksync (CLI)
//!                      |
//!                  ksync-core
//!        +-------+-----+------+--------+
//!        |       |            |        |
//!   definition  cache      remote    watch
//!        |       |            |
//!     filter   ksync-fs   HttpRemote / DryRunRemote
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ksync_core::{Settings, SyncEngine, SyncOptions};
//!
//! let mut settings = Settings::new("/srv/knowledge");
//! settings.api_key = Some("sk-...".into());
//! let mut engine = SyncEngine::connect(settings)?;
//! let report = engine.sync_all(SyncOptions::default())?;
//! println!("{} added", report.totals().added);
//! ```

pub mod cache;
pub mod definition;
pub mod error;
pub mod filter;
pub mod remote;
pub mod settings;
pub mod sync;
pub mod watch;

pub use cache::{CacheEntry, CacheStore, CollectionCache};
pub use definition::{
    Definition, DefinitionParser, PathWarning, Resolution, ResolvedFile, discover_definitions,
};
pub use error::{Error, Result};
pub use filter::FilterConfig;
pub use remote::{
    CollectionListing, DryRunRemote, FileListing, HttpRemote, PurgeOutcome, RemoteError,
    RemoteResult, RemoteStore,
};
pub use settings::{PrefixRewrite, Settings};
pub use sync::{
    CollectionReport, CollectionStatus, DiffAction, SyncCounts, SyncEngine, SyncOptions, SyncReport,
};
pub use watch::{Change, ChangeReason, WatchLoop, WatchSnapshot, detect_changes};
