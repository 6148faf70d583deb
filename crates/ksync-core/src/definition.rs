//! Definition documents
//!
//! Each `*.md` file in the knowledge root (other than `config.md`) defines
//! one collection, named after the file stem. Its non-blank, non-`#` lines
//! are path references to files or directories whose contents belong in
//! the collection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::filter::{FilterConfig, is_config_file};
use crate::settings::PrefixRewrite;
use crate::Result;

/// A definition document and the collection it declares.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Definition {
    pub collection: String,
    pub path: PathBuf,
}

impl Definition {
    /// Build a definition from its document path; `None` if the path has
    /// no usable file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let collection = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self { collection, path })
    }
}

/// List every definition document directly inside `knowledge_dir`,
/// sorted by collection name.
pub fn discover_definitions(knowledge_dir: &Path) -> Result<Vec<Definition>> {
    let mut definitions = Vec::new();
    for entry in fs::read_dir(knowledge_dir)? {
        let path = entry?.path();
        let is_markdown = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !is_markdown || is_config_file(&path) || !path.is_file() {
            continue;
        }
        if let Some(definition) = Definition::from_path(path) {
            definitions.push(definition);
        }
    }
    definitions.sort();
    Ok(definitions)
}

/// A concrete file selected by a definition.
///
/// The file name, not the full path, is the identity matched against the
/// remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub file_name: String,
}

impl ResolvedFile {
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self { path, file_name })
    }

    /// Lowercased extension including the leading dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
    }
}

/// A path reference that could not be resolved, or a file that was dropped.
///
/// Never fatal: the reference is skipped and resolution continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathWarning {
    pub reference: String,
    pub message: String,
}

impl PathWarning {
    fn new(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PathWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reference, self.message)
    }
}

/// The ordered, deduplicated file set of one definition.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub files: Vec<ResolvedFile>,
    pub warnings: Vec<PathWarning>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Nothing resolved and at least one reference failed, as when the
    /// mount holding every source is missing. Such a resolution must not
    /// drive removals.
    pub fn is_unavailable(&self) -> bool {
        self.files.is_empty() && !self.warnings.is_empty()
    }
}

/// Resolves definition documents into concrete file sets.
#[derive(Debug, Clone)]
pub struct DefinitionParser<'a> {
    filter: &'a FilterConfig,
    prefix: Option<&'a PrefixRewrite>,
    base_dir: PathBuf,
}

impl<'a> DefinitionParser<'a> {
    /// `base_dir` anchors relative references, normally the knowledge root.
    pub fn new(
        filter: &'a FilterConfig,
        prefix: Option<&'a PrefixRewrite>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filter,
            prefix,
            base_dir: base_dir.into(),
        }
    }

    /// Read and resolve a definition document.
    pub fn parse_file(&self, path: &Path) -> Result<Resolution> {
        let content = ksync_fs::io::read_text(path)?;
        Ok(self.parse(&content))
    }

    /// Resolve the text of a definition document.
    ///
    /// Files appear in reference order, each path at most once. When two
    /// different paths share a file name, the first one wins and the later
    /// one is reported as a warning. Warnings are collected, not logged;
    /// the caller knows which collection they belong to.
    pub fn parse(&self, content: &str) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen_paths = HashSet::new();
        let mut by_name: HashMap<String, PathBuf> = HashMap::new();

        for line in content.lines() {
            let reference = line.trim();
            if reference.is_empty() || reference.starts_with('#') {
                continue;
            }

            let paths = self.resolve_reference(reference, &mut resolution.warnings);
            for path in paths {
                if !seen_paths.insert(path.clone()) {
                    continue;
                }
                let Some(file) = ResolvedFile::new(path) else {
                    continue;
                };
                if let Some(first) = by_name.get(&file.file_name) {
                    let warning = PathWarning::new(
                        file.path.display().to_string(),
                        format!(
                            "file name '{}' is already provided by {}; skipping",
                            file.file_name,
                            first.display()
                        ),
                    );
                    resolution.warnings.push(warning);
                    continue;
                }
                by_name.insert(file.file_name.clone(), file.path.clone());
                resolution.files.push(file);
            }
        }

        resolution
    }

    /// Expand one path reference into the files it selects.
    ///
    /// A reference that does not exist or is neither a file nor a directory
    /// yields no files and a [`PathWarning`], as does every unreadable entry
    /// met while walking a directory.
    fn resolve_reference(
        &self,
        reference: &str,
        warnings: &mut Vec<PathWarning>,
    ) -> Vec<PathBuf> {
        match self.locate(reference) {
            Ok(path) if path.is_file() => {
                if self.filter.accepts(&path) {
                    vec![path]
                } else {
                    Vec::new()
                }
            }
            Ok(path) if path.is_dir() => self.walk_directory(reference, &path, warnings),
            Ok(_) => {
                warnings.push(PathWarning::new(reference, "not a regular file or directory"));
                Vec::new()
            }
            Err(warning) => {
                warnings.push(warning);
                Vec::new()
            }
        }
    }

    /// Apply the prefix rewrite, anchor relative paths and follow a symlink.
    fn locate(&self, reference: &str) -> std::result::Result<PathBuf, PathWarning> {
        let translated = match self.prefix {
            Some(prefix) => prefix.apply(reference),
            None => reference.to_string(),
        };

        let mut path = PathBuf::from(&translated);
        if path.is_relative() {
            path = self.base_dir.join(path);
        }

        let is_symlink = fs::symlink_metadata(&path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            path = fs::canonicalize(&path)
                .map_err(|e| PathWarning::new(reference, format!("broken symlink: {}", e)))?;
        }

        if !path.exists() {
            return Err(PathWarning::new(reference, "path does not exist"));
        }
        Ok(path)
    }

    /// Excluded directories are pruned, not descended into.
    fn walk_directory(
        &self,
        reference: &str,
        dir: &Path,
        warnings: &mut Vec<PathWarning>,
    ) -> Vec<PathBuf> {
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && self.filter.is_excluded_dir(entry.path()))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let message = format!("skipping unreadable entry: {}", e);
                    warnings.push(PathWarning::new(reference, message));
                    continue;
                }
            };
            if entry.file_type().is_file() && self.filter.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn names(resolution: &Resolution) -> Vec<&str> {
        resolution.files.iter().map(|f| f.file_name.as_str()).collect()
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("# heading\n\n   \na.md\n# a.md\n");

        assert_eq!(names(&resolution), vec!["a.md"]);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn missing_path_warns_and_continues() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.md"), "b").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("missing.md\nb.md\n");

        assert_eq!(names(&resolution), vec!["b.md"]);
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(resolution.warnings[0].reference, "missing.md");
    }

    #[test]
    fn single_file_respects_extension_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("image.png"), [0u8, 1, 2]).unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("image.png\n");

        assert!(resolution.is_empty());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn directory_is_expanded_recursively_in_name_order() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(docs.join("nested")).unwrap();
        fs::create_dir_all(docs.join(".git")).unwrap();
        fs::write(docs.join("b.md"), "b").unwrap();
        fs::write(docs.join("a.txt"), "a").unwrap();
        fs::write(docs.join("skip.bin"), "x").unwrap();
        fs::write(docs.join("nested").join("c.rst"), "c").unwrap();
        fs::write(docs.join(".git").join("description.md"), "git").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("docs\n");

        assert_eq!(names(&resolution), vec!["a.txt", "b.md", "c.rst"]);
    }

    #[test]
    fn duplicate_references_resolve_once() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.md"), "a").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("docs/a.md\ndocs\ndocs/a.md\n");

        assert_eq!(names(&resolution), vec!["a.md"]);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn same_file_name_first_wins() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("one")).unwrap();
        fs::create_dir_all(temp.path().join("two")).unwrap();
        fs::write(temp.path().join("one/readme.md"), "1").unwrap();
        fs::write(temp.path().join("two/readme.md"), "2").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("one/readme.md\ntwo/readme.md\n");

        assert_eq!(resolution.files.len(), 1);
        assert!(resolution.files[0].path.ends_with("one/readme.md"));
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0].message.contains("already provided"));
    }

    #[test]
    fn prefix_rewrite_is_applied_before_resolution() {
        let temp = TempDir::new().unwrap();
        let mount = temp.path().join("mount");
        fs::create_dir_all(&mount).unwrap();
        fs::write(mount.join("a.md"), "a").unwrap();
        let filter = FilterConfig::defaults();
        let prefix = PrefixRewrite {
            from: "/host/docs".to_string(),
            to: mount.display().to_string(),
        };
        let parser = DefinitionParser::new(&filter, Some(&prefix), temp.path());

        let resolution = parser.parse("/host/docs/a.md\n");

        assert_eq!(names(&resolution), vec!["a.md"]);
    }

    #[test]
    fn exclusions_match_full_path() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(docs.join("drafts")).unwrap();
        fs::write(docs.join("final.md"), "f").unwrap();
        fs::write(docs.join("drafts").join("wip.md"), "w").unwrap();
        let filter = FilterConfig::new([".md"], ["**/drafts/**"]).unwrap();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("docs\ndocs/drafts/wip.md\n");

        assert_eq!(names(&resolution), vec!["final.md"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_resolve_to_their_target() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("target.md"), "t").unwrap();
        std::os::unix::fs::symlink(&real, temp.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(real.join("target.md"), temp.path().join("alias.md")).unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("linked\nalias.md\n");

        assert_eq!(resolution.files.len(), 1);
        assert_eq!(resolution.files[0].file_name, "target.md");
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_a_warning() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("dangling.md"))
            .unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("dangling.md\n");

        assert!(resolution.is_empty());
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn excluded_directories_are_not_walked() {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("docs").join("node_modules");
        fs::create_dir_all(&modules).unwrap();
        fs::write(temp.path().join("docs").join("a.md"), "a").unwrap();
        fs::write(modules.join("pkg.md"), "p").unwrap();
        std::os::unix::fs::symlink(&modules, modules.join("loop")).unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("docs\n");

        assert_eq!(names(&resolution), vec!["a.md"]);
        assert!(resolution.warnings.is_empty(), "{:?}", resolution.warnings);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_walk_entry_is_collected_as_warning() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.md"), "a").unwrap();
        std::os::unix::fs::symlink(&docs, docs.join("cycle")).unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        let resolution = parser.parse("docs\n");

        assert_eq!(names(&resolution), vec!["a.md"]);
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(resolution.warnings[0].reference, "docs");
    }

    #[test]
    fn unavailable_only_when_nothing_resolved_and_something_failed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();
        let filter = FilterConfig::defaults();
        let parser = DefinitionParser::new(&filter, None, temp.path());

        assert!(parser.parse("/mount/gone/a.md\n").is_unavailable());
        assert!(!parser.parse("# no references\n").is_unavailable());
        assert!(!parser.parse("a.md\n/mount/gone/b.md\n").is_unavailable());
    }

    #[test]
    fn discover_skips_config_and_non_markdown() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("zeta.md"), "").unwrap();
        fs::write(temp.path().join("alpha.md"), "").unwrap();
        fs::write(temp.path().join("CONFIG.md"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        fs::write(temp.path().join(".sync_cache.json"), "{}").unwrap();
        fs::create_dir_all(temp.path().join("dir.md")).unwrap();

        let definitions = discover_definitions(temp.path()).unwrap();
        let collections: Vec<&str> = definitions.iter().map(|d| d.collection.as_str()).collect();

        assert_eq!(collections, vec!["alpha", "zeta"]);
    }

    #[test]
    fn resolved_file_extension_is_lowercased() {
        let file = ResolvedFile::new("/docs/README.MD").unwrap();
        assert_eq!(file.file_name, "README.MD");
        assert_eq!(file.extension().as_deref(), Some(".md"));
    }
}
