//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;
use ksync_core::PrefixRewrite;

/// Keep knowledge collections in sync with local definition documents
///
/// Every `*.md` in the knowledge directory (except config.md) names a
/// collection and lists, one per line, the files and directories that
/// belong in it.
///
/// Examples:
///   ksync                          # Sync once and exit
///   ksync --dry-run                # Show what would change
///   ksync --watch --interval 30    # Keep syncing every 30 seconds
///   ksync -d ./knowledge --force   # Re-upload everything
#[derive(Parser, Debug)]
#[command(name = "ksync")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Knowledge directory holding definition documents
    #[arg(short, long, env = "KNOWLEDGE_DIR")]
    pub dir: Option<PathBuf>,

    /// Base URL of the knowledge API
    #[arg(short, long, env = "OPEN_WEBUI_URL")]
    pub url: Option<String>,

    /// API key for the knowledge API
    #[arg(long, env = "OPEN_WEBUI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Where to keep the sync cache
    #[arg(long, env = "CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Base URL of the vector store
    #[arg(long, env = "QDRANT_URI")]
    pub vector_store_url: Option<String>,

    /// API key for the vector store
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub vector_store_api_key: Option<String>,

    /// Rewrite reference prefixes, as FROM:TO
    #[arg(long, env = "PATH_PREFIX_MAP")]
    pub path_prefix: Option<PrefixRewrite>,

    /// TOML file with default settings
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Keep running and re-sync collections as they change
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between watch passes [default: 60]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Re-upload every file regardless of the cache
    #[arg(short, long)]
    pub force: bool,

    /// Show what would happen without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Collections to sync in parallel [default: 1]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
