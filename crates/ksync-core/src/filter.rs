//! File filter configuration
//!
//! The optional `config.md` document in the knowledge root declares which
//! file extensions are synced and which paths are excluded:
//!
//! ```text
//! ## Extensions
//! .md
//! .txt
//!
//! ## Exclude
//! **/.git/**
//! **/drafts/**
//! ```
//!
//! A section that is absent or empty falls back to the built-in defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Name of the filter configuration document inside the knowledge root
pub const CONFIG_FILE: &str = "config.md";

pub const DEFAULT_EXTENSIONS: [&str; 6] = [".md", ".txt", ".rst", ".yaml", ".yml", ".json"];

pub const DEFAULT_EXCLUDES: [&str; 3] = ["**/node_modules/**", "**/.git/**", "**/__pycache__/**"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Extensions,
    Exclude,
}

/// Accepted extensions plus compiled exclusion patterns.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    extensions: BTreeSet<String>,
    excludes: Vec<String>,
    exclude_set: GlobSet,
}

impl FilterConfig {
    /// Build a filter from explicit extensions and exclusion globs.
    ///
    /// Extensions are matched case-insensitively and must include the
    /// leading dot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Glob`] if a pattern does not compile.
    pub fn new<E, X>(extensions: E, excludes: X) -> Result<Self>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().to_lowercase())
            .collect();
        let excludes: Vec<String> = excludes
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        let exclude_set = compile_excludes(&excludes)?;

        Ok(Self {
            extensions,
            excludes,
            exclude_set,
        })
    }

    /// The built-in filter used when no configuration document exists.
    pub fn defaults() -> Self {
        let excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        let exclude_set = compile_excludes(&excludes).unwrap_or_else(|_| GlobSet::empty());
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            excludes,
            exclude_set,
        }
    }

    /// Parse the text of a configuration document.
    ///
    /// Headings starting with `## Extensions` and `## Exclude` open a
    /// section; other `#` lines and blank lines are ignored. Extension lines
    /// must start with `.`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut section = None;
        let mut extensions = Vec::new();
        let mut excludes = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with("## Extensions") {
                section = Some(Section::Extensions);
            } else if line.starts_with("## Exclude") {
                section = Some(Section::Exclude);
            } else if line.is_empty() || line.starts_with('#') {
                continue;
            } else {
                match section {
                    Some(Section::Extensions) if line.starts_with('.') => {
                        extensions.push(line.to_string())
                    }
                    Some(Section::Extensions) => {
                        warn!(line, "ignoring extension without leading '.'");
                    }
                    Some(Section::Exclude) => excludes.push(line.to_string()),
                    None => debug!(line, "ignoring line outside of any section"),
                }
            }
        }

        if extensions.is_empty() {
            extensions = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        }
        if excludes.is_empty() {
            excludes = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        }

        Self::new(extensions, excludes)
    }

    /// Load the filter for a knowledge root, falling back to defaults when
    /// the configuration document is absent.
    pub fn load(knowledge_dir: &Path) -> Result<Self> {
        let Some(path) = find_config_file(knowledge_dir) else {
            info!("no {} found, using default filters", CONFIG_FILE);
            return Ok(Self::defaults());
        };

        let content = ksync_fs::io::read_text(&path)?;
        let config = Self::parse(&content)?;
        info!(
            extensions = config.extensions.len(),
            excludes = config.excludes.len(),
            "loaded filter configuration"
        );
        Ok(config)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Whether the file's extension is in the accepted set.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Whether the full path matches any exclusion pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_set.is_match(path)
    }

    /// Whether a pattern covers everything below `dir`, so a walk can skip
    /// it. Tested with a placeholder child; `**/drafts/**` covers `drafts`,
    /// `**/drafts/*.md` does not.
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        self.exclude_set.is_match(dir.join("_"))
    }

    /// Whether a resolved file passes both the extension and exclusion filters.
    pub fn accepts(&self, path: &Path) -> bool {
        self.accepts_extension(path) && !self.is_excluded(path)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Locate the configuration document, matching its name case-insensitively.
pub fn find_config_file(knowledge_dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(knowledge_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| is_config_file(path) && path.is_file())
}

/// Whether `path` names the configuration document.
pub fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(CONFIG_FILE))
}

/// Patterns are shell globs over the whole path; `*` also crosses `/`.
fn compile_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| Error::Glob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::Glob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}
