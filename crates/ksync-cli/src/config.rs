//! Settings resolution: flags and environment, then the settings file,
//! then built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use ksync_core::settings::{CACHE_FILE_NAME, default_cache_file};
use ksync_core::{PrefixRewrite, Settings};
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Knowledge directory used when none is configured, relative to the
/// working directory.
pub const DEFAULT_KNOWLEDGE_DIR: &str = "knowledge";

/// Default seconds between watch passes.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Contents of a `--settings` TOML file. Every key is optional.
///
/// ```toml
/// knowledge_dir = "/srv/knowledge"
/// api_url = "http://localhost:8000"
/// vector_collections = ["open-webui_knowledge", "open-webui_files"]
/// jobs = 4
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub knowledge_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub cache_file: Option<PathBuf>,
    pub vector_store_url: Option<String>,
    pub vector_store_api_key: Option<String>,
    pub vector_collections: Option<Vec<String>>,
    pub path_prefix: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub jobs: Option<usize>,
    pub interval_secs: Option<u64>,
}

impl SettingsFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = ksync_fs::io::read_text(path)?;
        Self::parse(&content)
    }
}

/// Everything the commands need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub settings: Settings,
    pub interval: Duration,
}

/// Merge the command line (which already carries the environment) over the
/// optional settings file and the defaults.
pub fn resolve(cli: &Cli) -> Result<Resolved> {
    let file = match &cli.settings {
        Some(path) => SettingsFile::load(path)?,
        None => SettingsFile::default(),
    };
    merge(cli, file)
}

fn merge(cli: &Cli, file: SettingsFile) -> Result<Resolved> {
    let knowledge_dir = cli
        .dir
        .clone()
        .or(file.knowledge_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_DIR));

    let mut settings = Settings::new(&knowledge_dir);
    settings.cache_file = cli
        .cache_file
        .clone()
        .or(file.cache_file)
        .unwrap_or_else(|| platform_cache_file(&knowledge_dir));

    if let Some(url) = cli.url.clone().or(file.api_url) {
        settings.api_url = url;
    }
    settings.api_key = cli.api_key.clone().or(file.api_key);
    if let Some(url) = cli.vector_store_url.clone().or(file.vector_store_url) {
        settings.vector_store_url = url;
    }
    settings.vector_store_api_key = cli
        .vector_store_api_key
        .clone()
        .or(file.vector_store_api_key)
        .filter(|key| !key.trim().is_empty());
    if let Some(collections) = file.vector_collections {
        settings.vector_collections = collections;
    }

    settings.path_prefix = match (&cli.path_prefix, file.path_prefix) {
        (Some(prefix), _) => Some(prefix.clone()),
        (None, Some(raw)) if !raw.is_empty() => Some(raw.parse::<PrefixRewrite>()?),
        (None, _) => None,
    };

    if let Some(secs) = file.request_timeout_secs {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = file.settle_delay_ms {
        settings.settle_delay = Duration::from_millis(ms);
    }

    let jobs = match cli.jobs {
        Some(jobs) => usize::try_from(jobs).map_err(|_| CliError::user("--jobs is too large"))?,
        None => file.jobs.unwrap_or(1),
    };
    if jobs == 0 {
        return Err(CliError::user("jobs must be at least 1"));
    }
    settings.jobs = jobs;

    let interval_secs = cli
        .interval
        .or(file.interval_secs)
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    if interval_secs == 0 {
        return Err(CliError::user("interval must be at least 1 second"));
    }

    Ok(Resolved {
        settings,
        interval: Duration::from_secs(interval_secs),
    })
}

/// `<platform cache dir>/knowledge-sync/sync_cache.json`, or a dotfile in the
/// knowledge directory when the platform has no cache dir.
fn platform_cache_file(knowledge_dir: &Path) -> PathBuf {
    match dirs::cache_dir() {
        Some(dir) => dir.join("knowledge-sync").join(CACHE_FILE_NAME),
        None => default_cache_file(knowledge_dir),
    }
}
