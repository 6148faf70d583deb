//! Polling watch mode
//!
//! Every interval the knowledge root is captured into a [`WatchSnapshot`]
//! and compared against the previous one and the sync cache by
//! [`detect_changes`]. Only collections with a detected change are
//! re-synced.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use ksync_fs::ContentHash;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::definition::Definition;
use crate::sync::{SyncEngine, SyncOptions, SyncReport};
use crate::Result;

/// Granularity of the interruptible sleep between passes.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Observed state of one definition and the files it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionState {
    pub definition: Definition,
    pub modified: Option<SystemTime>,
    /// Content hash per resolved file name; `None` if it could not be read.
    pub sources: BTreeMap<String, Option<ContentHash>>,
    /// Nothing resolved and some reference failed
    pub unavailable: bool,
}

/// Observed state of every definition at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSnapshot {
    pub definitions: BTreeMap<String, DefinitionState>,
}

impl WatchSnapshot {
    /// Read the knowledge root through the engine's parser and filter.
    ///
    /// Definitions that cannot be read are left out and logged.
    pub fn capture(engine: &SyncEngine) -> Result<Self> {
        let mut snapshot = Self::default();
        for definition in engine.definitions()? {
            let resolution = match engine.resolve(&definition) {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!(collection = %definition.collection, "cannot read definition: {}", e);
                    continue;
                }
            };
            let modified = std::fs::metadata(&definition.path)
                .and_then(|m| m.modified())
                .ok();
            let sources = resolution
                .files
                .iter()
                .map(|file| (file.file_name.clone(), ksync_fs::hash_file(&file.path).ok()))
                .collect();
            snapshot.definitions.insert(
                definition.collection.clone(),
                DefinitionState {
                    definition,
                    modified,
                    sources,
                    unavailable: resolution.is_unavailable(),
                },
            );
        }
        Ok(snapshot)
    }
}

/// Why a collection needs another sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// Definition not present in the previous snapshot
    NewDefinition,
    /// Definition document's modification time advanced
    DefinitionModified,
    /// A resolved file's content differs from what was last synced
    SourceChanged(String),
    /// A resolved file has never been synced
    SourceAdded(String),
    /// A synced file is no longer resolved
    SourceRemoved(String),
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewDefinition => write!(f, "new definition"),
            Self::DefinitionModified => write!(f, "definition modified"),
            Self::SourceChanged(name) => write!(f, "{} changed", name),
            Self::SourceAdded(name) => write!(f, "{} added", name),
            Self::SourceRemoved(name) => write!(f, "{} removed", name),
        }
    }
}

/// A collection that needs re-syncing and the first reason found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub definition: Definition,
    pub reason: ChangeReason,
}

/// Decide which collections changed between two snapshots.
///
/// Definition documents are compared by modification time against
/// `previous`; resolved files are compared by content hash against `cache`.
/// At most one change is reported per collection. An unavailable
/// definition never reports removals, since syncing it would not touch the
/// remote; one emptied on purpose does.
pub fn detect_changes(previous: &WatchSnapshot, current: &WatchSnapshot, cache: &CacheStore) -> Vec<Change> {
    current
        .definitions
        .iter()
        .filter_map(|(collection, state)| {
            let reason = change_reason(previous.definitions.get(collection), state, cache)?;
            Some(Change {
                definition: state.definition.clone(),
                reason,
            })
        })
        .collect()
}

fn change_reason(
    previous: Option<&DefinitionState>,
    current: &DefinitionState,
    cache: &CacheStore,
) -> Option<ChangeReason> {
    let Some(previous) = previous else {
        return Some(ChangeReason::NewDefinition);
    };
    if let (Some(before), Some(now)) = (previous.modified, current.modified) {
        if now > before {
            return Some(ChangeReason::DefinitionModified);
        }
    }

    let collection = current.definition.collection.as_str();
    for (file_name, hash) in &current.sources {
        match (cache.get(collection, file_name), hash) {
            (None, _) => return Some(ChangeReason::SourceAdded(file_name.clone())),
            (Some(entry), Some(hash)) if !entry.matches(hash) => {
                return Some(ChangeReason::SourceChanged(file_name.clone()));
            }
            _ => {}
        }
    }

    if current.unavailable {
        return None;
    }
    cache
        .collection(collection)?
        .keys()
        .find(|name| !current.sources.contains_key(name.as_str()))
        .map(|name| ChangeReason::SourceRemoved(name.clone()))
}

/// Repeats change detection and targeted syncs until stopped.
pub struct WatchLoop<'a> {
    engine: &'a mut SyncEngine,
    interval: Duration,
    options: SyncOptions,
    stop: Arc<AtomicBool>,
}

impl<'a> WatchLoop<'a> {
    pub fn new(engine: &'a mut SyncEngine, interval: Duration, options: SyncOptions) -> Self {
        Self {
            engine,
            interval,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop once set; share it with a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Capture the current state, re-sync whatever changed relative to
    /// `previous`, and return the new baseline with the pass's report.
    pub fn poll_once(&mut self, previous: &WatchSnapshot) -> Result<(WatchSnapshot, SyncReport)> {
        let current = WatchSnapshot::capture(self.engine)?;

        for gone in previous.definitions.keys() {
            if !current.definitions.contains_key(gone) {
                info!(collection = %gone, "definition removed, no longer watched");
            }
        }

        let changes = detect_changes(previous, &current, self.engine.cache());
        if changes.is_empty() {
            debug!("no changes detected");
            return Ok((current, SyncReport {
                dry_run: self.options.dry_run,
                collections: Vec::new(),
            }));
        }

        for change in &changes {
            info!(collection = %change.definition.collection, "change detected: {}", change.reason);
        }
        let definitions: Vec<Definition> = changes.into_iter().map(|c| c.definition).collect();
        let report = self.engine.sync_definitions(&definitions, self.options);
        Ok((current, report))
    }

    /// Run until the stop flag is set.
    ///
    /// The caller is expected to have completed an initial full sync; the
    /// first poll happens one interval after the loop starts. `on_pass`
    /// sees the report of every pass that synced something.
    pub fn run(&mut self, mut on_pass: impl FnMut(&SyncReport)) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "watching for changes");
        let mut previous = WatchSnapshot::capture(self.engine)?;

        while self.sleep() {
            match self.poll_once(&previous) {
                Ok((current, report)) => {
                    if !report.collections.is_empty() {
                        on_pass(&report);
                    }
                    previous = current;
                }
                Err(e) => error!("watch pass failed: {}", e),
            }
        }

        info!("watch stopped");
        Ok(())
    }

    /// Sleep one interval in short slices; false once stop is requested.
    fn sleep(&self) -> bool {
        let mut remaining = self.interval;
        while !remaining.is_zero() {
            if self.stop.load(Ordering::SeqCst) {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
        !self.stop.load(Ordering::SeqCst)
    }
}
