//! Source file-set enumeration.
//!
//! A [`FileSet`] pairs a root directory with include/exclude glob patterns
//! and enumerates the matching files in deterministic (path-sorted) order.
//! Patterns match forward-slash paths relative to the root, so `*.js`
//! selects top-level files only while `**/*.js` recurses.
//!
//! Enumeration never reads file contents; callers decide what to read and
//! when.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum FileSetError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single enumerated source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the file-set root.
    pub rel: PathBuf,
}

impl SourceFile {
    /// Relative path with forward slashes, for reports and URLs.
    pub fn rel_display(&self) -> String {
        rel_slashes(&self.rel)
    }
}

/// Render a relative path with forward-slash separators.
pub fn rel_slashes(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A root directory plus include/exclude globs over its files.
#[derive(Debug, Clone)]
pub struct FileSet {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl FileSet {
    pub fn new(
        root: impl Into<PathBuf>,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, FileSetError> {
        Ok(Self {
            root: root.into(),
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root-relative forward-slash path belongs to this set.
    pub fn matches_rel(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }

    /// Walk the root and collect matching files, sorted by relative path.
    ///
    /// A missing root yields an empty set rather than an error; a walk
    /// failure below an existing root is an error.
    pub fn enumerate(&self) -> Result<Vec<SourceFile>, FileSetError> {
        if !self.root.exists() {
            tracing::debug!(root = %self.root.display(), "file-set root missing, empty set");
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            if self.matches_rel(&rel_slashes(&rel)) {
                files.push(SourceFile {
                    path: entry.into_path(),
                    rel,
                });
            }
        }
        files.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok(files)
    }
}

pub(crate) fn build_set(patterns: &[String]) -> Result<GlobSet, FileSetError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| FileSetError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| FileSetError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}
