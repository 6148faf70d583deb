//! Process settings
//!
//! [`Settings`] is built once by the binary and passed by reference into
//! every component. Nothing below the binary reads the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_VECTOR_STORE_URL: &str = "http://localhost:6333";
pub const DEFAULT_VECTOR_COLLECTIONS: [&str; 2] = ["open-webui_knowledge", "open-webui_files"];
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const CACHE_FILE_NAME: &str = "sync_cache.json";

/// Rewrites a leading path prefix in definition references.
///
/// Lets one definition serve two mount roots, e.g. `/home/me/docs:/docs`
/// when the same knowledge directory is read inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRewrite {
    pub from: String,
    pub to: String,
}

impl PrefixRewrite {
    /// Apply the rewrite if `reference` starts with the `from` prefix.
    pub fn apply(&self, reference: &str) -> String {
        match reference.strip_prefix(&self.from) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => reference.to_string(),
        }
    }
}

impl FromStr for PrefixRewrite {
    type Err = Error;

    /// Parses `FROM:TO`, splitting on the first colon.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((from, to)) if !from.is_empty() => Ok(Self {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(Error::configuration(format!(
                "path prefix map '{}' must have the form FROM:TO",
                s
            ))),
        }
    }
}

/// Explicit configuration for one knowledge-sync process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the definition documents and `config.md`
    pub knowledge_dir: PathBuf,
    /// Base URL of the knowledge API
    pub api_url: String,
    /// Bearer credential for the knowledge API
    pub api_key: Option<String>,
    /// Location of the persisted sync cache
    pub cache_file: PathBuf,
    /// Base URL of the vector store used by the duplicate purge
    pub vector_store_url: String,
    pub vector_store_api_key: Option<String>,
    /// Vector store collections searched by the duplicate purge
    pub vector_collections: Vec<String>,
    pub path_prefix: Option<PrefixRewrite>,
    pub request_timeout: Duration,
    /// Pause between uploading a file and attaching it
    pub settle_delay: Duration,
    /// Number of collections reconciled concurrently
    pub jobs: usize,
}

impl Settings {
    /// Settings with built-in defaults for everything but the knowledge root.
    pub fn new(knowledge_dir: impl Into<PathBuf>) -> Self {
        let knowledge_dir = knowledge_dir.into();
        let cache_file = default_cache_file(&knowledge_dir);
        Self {
            knowledge_dir,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            cache_file,
            vector_store_url: DEFAULT_VECTOR_STORE_URL.to_string(),
            vector_store_api_key: None,
            vector_collections: DEFAULT_VECTOR_COLLECTIONS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            path_prefix: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            jobs: 1,
        }
    }

    /// The credential, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Check the settings that must hold before any sync is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the credential is missing or the
    /// knowledge root is not a readable directory.
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(Error::configuration(
                "no API key configured; set OPEN_WEBUI_API_KEY (Settings > Account > API Keys)",
            ));
        }
        if !self.knowledge_dir.is_dir() {
            return Err(Error::configuration(format!(
                "knowledge directory {} does not exist or is not a directory",
                self.knowledge_dir.display()
            )));
        }
        std::fs::read_dir(&self.knowledge_dir).map_err(|e| {
            Error::configuration(format!(
                "knowledge directory {} is not readable: {}",
                self.knowledge_dir.display(),
                e
            ))
        })?;
        if self.jobs == 0 {
            return Err(Error::configuration("jobs must be at least 1"));
        }
        Ok(())
    }
}

/// Cache location used when nothing else is configured: a dotfile inside
/// the knowledge root. Definition discovery only looks at `*.md`, so the
/// cache never shows up as a collection.
pub fn default_cache_file(knowledge_dir: &Path) -> PathBuf {
    knowledge_dir.join(format!(".{}", CACHE_FILE_NAME))
}
