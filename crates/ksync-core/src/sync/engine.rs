//! Sync engine: discovery, resolution and reconciliation of every collection

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use super::locks::ContentLocks;
use super::reconciler::Reconciler;
use super::report::{CollectionReport, CollectionStatus, SyncReport};
use crate::cache::CacheStore;
use crate::definition::{Definition, DefinitionParser, Resolution, discover_definitions};
use crate::filter::FilterConfig;
use crate::remote::{DryRunRemote, HttpRemote, RemoteStore};
use crate::settings::Settings;
use crate::Result;

/// Per-pass switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-upload every resolved file regardless of the cache
    pub force: bool,
    /// Classify and report without mutating the remote or the cache
    pub dry_run: bool,
}

/// Owns everything one sync process needs: settings, the file filter, the
/// remote, and the persistent cache.
pub struct SyncEngine {
    settings: Settings,
    filter: FilterConfig,
    remote: Box<dyn RemoteStore>,
    cache: CacheStore,
    locks: ContentLocks,
}

impl SyncEngine {
    /// Build an engine around an arbitrary remote.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the settings do not
    /// validate, or a glob error if `config.md` names a bad pattern.
    pub fn new(settings: Settings, remote: Box<dyn RemoteStore>) -> Result<Self> {
        settings.validate()?;
        let filter = FilterConfig::load(&settings.knowledge_dir)?;
        let cache = CacheStore::load(&settings.cache_file);
        debug!(
            knowledge_dir = %settings.knowledge_dir.display(),
            cache = %settings.cache_file.display(),
            cached = cache.len(),
            "engine ready"
        );
        Ok(Self {
            settings,
            filter,
            remote,
            cache,
            locks: ContentLocks::new(),
        })
    }

    /// Build an engine talking HTTP to the configured knowledge API.
    pub fn connect(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let remote = HttpRemote::new(&settings)?;
        Self::new(settings, Box::new(remote))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Definition documents currently in the knowledge root.
    pub fn definitions(&self) -> Result<Vec<Definition>> {
        discover_definitions(&self.settings.knowledge_dir)
    }

    /// Resolve one definition into its file set.
    pub fn resolve(&self, definition: &Definition) -> Result<Resolution> {
        DefinitionParser::new(
            &self.filter,
            self.settings.path_prefix.as_ref(),
            &self.settings.knowledge_dir,
        )
        .parse_file(&definition.path)
    }

    /// Sync every definition in the knowledge root.
    pub fn sync_all(&mut self, options: SyncOptions) -> Result<SyncReport> {
        let definitions = self.definitions()?;
        if definitions.is_empty() {
            warn!(
                knowledge_dir = %self.settings.knowledge_dir.display(),
                "no definition documents found"
            );
        }
        Ok(self.sync_definitions(&definitions, options))
    }

    /// Sync the given definitions.
    ///
    /// Collections run on up to `settings.jobs` workers. Each worker works on
    /// a copy of its collection's cache slice and writes it back when done.
    /// Live runs persist the cache after every collection, dry runs work on
    /// a copy that is thrown away.
    pub fn sync_definitions(&mut self, definitions: &[Definition], options: SyncOptions) -> SyncReport {
        let dry_run_remote = DryRunRemote::new(self.remote.as_ref());
        let remote: &dyn RemoteStore = if options.dry_run {
            &dry_run_remote
        } else {
            self.remote.as_ref()
        };

        let working_cache = if options.dry_run {
            self.cache.clone()
        } else {
            std::mem::replace(&mut self.cache, CacheStore::empty(&self.settings.cache_file))
        };
        let cache = Mutex::new(working_cache);
        let queue = Mutex::new(definitions.iter().enumerate().collect::<VecDeque<_>>());
        let results = Mutex::new(Vec::with_capacity(definitions.len()));

        let worker = || {
            loop {
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some((index, definition)) = next else {
                    break;
                };
                let report = self.sync_one(definition, remote, &cache, options);
                results
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((index, report));
            }
        };

        let workers = self.settings.jobs.clamp(1, definitions.len().max(1));
        if workers == 1 {
            worker();
        } else {
            debug!(workers, "syncing collections in parallel");
            std::thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(&worker);
                }
            });
        }

        let cache = cache.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !options.dry_run {
            self.cache = cache;
        }

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(index, _)| *index);
        SyncReport {
            dry_run: options.dry_run,
            collections: results.into_iter().map(|(_, report)| report).collect(),
        }
    }

    fn sync_one(
        &self,
        definition: &Definition,
        remote: &dyn RemoteStore,
        cache: &Mutex<CacheStore>,
        options: SyncOptions,
    ) -> CollectionReport {
        let collection = definition.collection.as_str();
        let resolution = match self.resolve(definition) {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(collection, "cannot read definition: {}", e);
                return CollectionReport::aborted(collection, format!("cannot read definition: {}", e));
            }
        };
        let warnings: Vec<String> = resolution.warnings.iter().map(ToString::to_string).collect();
        for warning in &warnings {
            warn!(collection, "{}", warning);
        }

        if resolution.is_unavailable() {
            info!(collection, "no reference resolved, leaving collection untouched");
            let mut report = CollectionReport::new(collection);
            report.status = CollectionStatus::Unavailable;
            report.warnings = warnings;
            return report;
        }

        info!(
            collection,
            files = resolution.files.len(),
            dry_run = options.dry_run,
            "syncing collection"
        );

        // Stored slice stays in place until put_collection.
        let mut entries = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collection(collection)
            .cloned()
            .unwrap_or_default();
        let mut report = Reconciler::new(remote, &self.locks)
            .force(options.force)
            .reconcile(collection, &resolution.files, &mut entries);
        report.warnings.extend(warnings);

        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put_collection(collection, entries);
        if !options.dry_run && !report.is_aborted() {
            if let Err(e) = cache.persist() {
                error!(collection, "failed to persist sync cache: {}", e);
                report.warnings.push(format!("failed to persist sync cache: {}", e));
            }
        }

        let counts = report.counts();
        info!(
            collection,
            added = counts.added,
            updated = counts.updated,
            removed = counts.removed,
            skipped = report.skipped(),
            failed = report.failures.len(),
            "collection done"
        );
        report
    }
}
