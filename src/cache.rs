//! Lint result cache for incremental runs.
//!
//! Linting is cheap per file but runs on every script rebuild, including
//! each save in watch mode. This module lets the lint runner skip files
//! whose recorded modification time matches the one on disk, replaying the
//! stored findings instead of re-reading and re-checking the source.
//!
//! ## Cache keys
//!
//! Entries are keyed by the file's absolute path. A hit additionally
//! requires the stored `mtime` string to match the current one, so editing
//! a file (or checking out another revision that touches it) invalidates
//! its entry on the next run. The modification time is stored as an
//! RFC 3339 UTC timestamp with millisecond precision.
//!
//! ## Storage
//!
//! The cache is a JSON file, by default at `tmp/cache-eslint.json` under
//! the project root (configurable via `[lint] cache_file`). A missing or
//! unreadable cache simply means a cold start: every file is linted and a
//! fresh cache is written afterwards. Saves go through a temporary file
//! and a rename, so a crash mid-write never leaves a truncated cache.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::lint::LintOutcome;

/// Version of the cache file format. Bump this to invalidate all existing
/// caches when the format changes.
const CACHE_VERSION: u32 = 1;

/// A single cached lint result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    pub mtime: String,
    pub outcome: LintOutcome,
}

/// On-disk cache mapping absolute file paths to their last lint result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LintCache {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl LintCache {
    /// Create an empty cache (first run, or cache invalidated).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load the cache from `path`. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (corruption, version mismatch).
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                tracing::debug!(path = %path.display(), "no lint cache, starting cold");
                return Self::empty();
            }
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "discarding unreadable lint cache");
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            tracing::debug!(
                found = cache.version,
                expected = CACHE_VERSION,
                "lint cache version changed, starting cold"
            );
            return Self::empty();
        }
        cache
    }

    /// Save the cache to `path`, creating parent directories as needed.
    /// The write goes to a sibling temporary file first, then renames over
    /// the target.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    /// Look up a cached outcome for `path_key`. Returns `Some` only when
    /// the stored modification time matches `mtime`.
    pub fn lookup(&self, path_key: &str, mtime: &str) -> Option<&LintOutcome> {
        let entry = self.entries.get(path_key)?;
        if entry.mtime == mtime {
            Some(&entry.outcome)
        } else {
            None
        }
    }

    /// Record the outcome for `path_key`, replacing any previous entry.
    pub fn record(&mut self, path_key: String, mtime: String, outcome: LintOutcome) {
        self.entries.insert(path_key, CacheEntry { mtime, outcome });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Modification time of `path` as an RFC 3339 UTC string with millisecond
/// precision, e.g. `2026-03-01T09:30:12.345Z`.
pub fn file_mtime(path: &Path) -> io::Result<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    let stamp = DateTime::<Utc>::from(modified);
    Ok(stamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
