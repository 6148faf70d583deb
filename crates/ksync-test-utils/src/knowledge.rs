//! [`KnowledgeFixture`] builder for sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ksync_core::Settings;
use tempfile::TempDir;

/// A temporary workspace with a knowledge root, a source tree, and a cache
/// location, laid out as:
///
/// ```text
/// <tmp>/knowledge/   definitions and config.md
/// <tmp>/docs/        source files referenced by definitions
/// <tmp>/state/       sync cache
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use ksync_test_utils::KnowledgeFixture;
///
/// let fixture = KnowledgeFixture::new();
/// let intro = fixture.source("intro.md", "# Intro");
/// fixture.define("handbook", &[intro.to_str().unwrap()]);
/// let settings = fixture.settings();
/// ```
pub struct KnowledgeFixture {
    temp_dir: TempDir,
}

impl Default for KnowledgeFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("knowledge")).unwrap();
        fs::create_dir_all(temp_dir.path().join("docs")).unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.root().join("knowledge")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root().join("docs")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.root().join("state").join("sync_cache.json")
    }

    /// Write a source file under `docs/`, creating parent directories.
    pub fn source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.docs_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove_source(&self, relative: &str) {
        fs::remove_file(self.docs_dir().join(relative)).unwrap();
    }

    /// Write `knowledge/<collection>.md` with one reference per line.
    pub fn define(&self, collection: &str, references: &[&str]) -> PathBuf {
        let path = self.knowledge_dir().join(format!("{}.md", collection));
        let mut content = format!("# {} sources\n", collection);
        for reference in references {
            content.push_str(reference);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `knowledge/config.md`.
    pub fn config(&self, content: &str) -> PathBuf {
        let path = self.knowledge_dir().join("config.md");
        fs::write(&path, content).unwrap();
        path
    }

    /// Settings pointing at this fixture, with a test credential and no
    /// post-upload delay.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(self.knowledge_dir());
        settings.api_key = Some("sk-test".to_string());
        settings.cache_file = self.cache_file();
        settings.settle_delay = Duration::ZERO;
        settings
    }

    /// Raw cache file content, if the cache has been persisted.
    pub fn cache_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.cache_file()).ok()
    }
}
