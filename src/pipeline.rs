//! Per-file transform pipeline core.
//!
//! Every build branch (pages, styles, images, scripts, fonts) is an
//! explicit ordered list of steps applied to each file of a [`FileSet`]:
//!
//! ```text
//! enumerate -> read -> step 1 -> step 2 -> ... -> write
//! ```
//!
//! An [`Asset`] carries the file through the steps: its relative path (which
//! steps may rewrite, e.g. `.tera` -> `.html` or hashed stylesheet names),
//! its contents, and any sidecar files to write next to it (source maps).
//!
//! Error handling is two-tier. A failing step drops that one file: the
//! failure goes to the [`Notifier`] and the remaining files still run.
//! Failures that poison the whole run (the set cannot be enumerated, a
//! template engine will not construct) surface as [`PipelineError`] from
//! [`Pipeline::run`] instead.
//!
//! Files are processed in parallel; the report lists outcomes in source
//! enumeration order regardless.

use crate::fileset::{FileSet, FileSetError, SourceFile, rel_slashes};
use crate::notifier::Notifier;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error from a single pipeline step, scoped to one file.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("file is not valid UTF-8")]
    NotText,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Style(#[from] crate::scss::ScssError),
    #[error("{0}")]
    Failed(String),
}

impl StepError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error that aborts a whole pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    FileSet(#[from] FileSetError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file flowing through a pipeline.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Destination path relative to the pipeline's output root. Starts as
    /// the source-relative path; steps may rewrite it.
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
    /// Extra files written next to the asset (e.g. `.map`).
    pub sidecars: Vec<Sidecar>,
    /// Original text recorded for source-map emission, when enabled.
    pub source: Option<RecordedSource>,
}

#[derive(Debug, Clone)]
pub struct Sidecar {
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RecordedSource {
    /// Set-relative source path, forward-slashed.
    pub rel: String,
    pub text: String,
}

impl Asset {
    pub fn new(rel_path: PathBuf, contents: Vec<u8>) -> Self {
        Self {
            rel_path,
            contents,
            sidecars: Vec::new(),
            source: None,
        }
    }

    /// Contents as UTF-8 text. Binary files fail the step.
    pub fn text(&self) -> Result<&str, StepError> {
        std::str::from_utf8(&self.contents).map_err(|_| StepError::NotText)
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }

    pub fn rel_display(&self) -> String {
        rel_slashes(&self.rel_path)
    }
}

pub type StepResult = Result<Asset, StepError>;

/// Step: remember the original text of a text asset so a later step can
/// emit a source map for it. Used as the first step of development
/// pipelines.
pub fn record_source(mut asset: Asset) -> StepResult {
    let text = asset.text()?.to_string();
    asset.source = Some(RecordedSource {
        rel: asset.rel_display(),
        text,
    });
    Ok(asset)
}

struct Step {
    name: &'static str,
    apply: Box<dyn Fn(Asset) -> StepResult + Send + Sync>,
}

/// An ordered list of per-file steps plus run policy.
pub struct Pipeline {
    name: &'static str,
    skip_existing: bool,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            skip_existing: false,
            steps: Vec::new(),
        }
    }

    /// Skip files whose destination already exists (freshness by presence,
    /// not by timestamp: stale destinations are refreshed by `clean`).
    pub fn skip_existing(mut self) -> Self {
        self.skip_existing = true;
        self
    }

    /// Append a step.
    pub fn step<F>(mut self, name: &'static str, apply: F) -> Self
    where
        F: Fn(Asset) -> StepResult + Send + Sync + 'static,
    {
        self.steps.push(Step {
            name,
            apply: Box::new(apply),
        });
        self
    }

    /// Append a step only when `enabled`. Mode-dependent steps are decided
    /// here, at construction, so the executed step list is explicit.
    pub fn step_if<F>(self, enabled: bool, name: &'static str, apply: F) -> Self
    where
        F: Fn(Asset) -> StepResult + Send + Sync + 'static,
    {
        if enabled { self.step(name, apply) } else { self }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run every file of `files` through the steps, writing results under
    /// `dest`. Per-file failures are routed to `notifier` and recorded in
    /// the report; only run-poisoning failures return `Err`.
    pub fn run(
        &self,
        files: &FileSet,
        dest: &Path,
        notifier: &Notifier,
    ) -> Result<PipelineReport, PipelineError> {
        let sources = files.enumerate()?;
        let outcomes: Vec<FileOutcome> = sources
            .par_iter()
            .map(|source| self.run_one(source, dest, notifier))
            .collect();

        let mut report = PipelineReport::new(self.name);
        for outcome in outcomes {
            match outcome {
                FileOutcome::Written(rel) => report.written.push(rel),
                FileOutcome::Skipped(rel) => report.skipped.push(rel),
                FileOutcome::Failed(rel) => report.failed.push(rel),
            }
        }
        Ok(report)
    }

    fn run_one(&self, source: &SourceFile, dest: &Path, notifier: &Notifier) -> FileOutcome {
        let rel = source.rel_display();
        if self.skip_existing && dest.join(&source.rel).exists() {
            tracing::debug!(pipeline = self.name, file = %rel, "destination present, skipped");
            return FileOutcome::Skipped(rel);
        }
        let contents = match fs::read(&source.path) {
            Ok(contents) => contents,
            Err(e) => {
                notifier.notify(self.name, Some(rel.clone()), format!("read failed: {e}"));
                return FileOutcome::Failed(rel);
            }
        };
        let mut asset = Asset::new(source.rel.clone(), contents);
        for step in &self.steps {
            asset = match (step.apply)(asset) {
                Ok(asset) => asset,
                Err(e) => {
                    notifier.notify(self.name, Some(rel.clone()), format!("{}: {e}", step.name));
                    return FileOutcome::Failed(rel);
                }
            };
        }
        if let Err(e) = write_asset(dest, &asset) {
            notifier.notify(self.name, Some(rel.clone()), format!("write failed: {e}"));
            return FileOutcome::Failed(rel);
        }
        tracing::debug!(pipeline = self.name, file = %asset.rel_display(), "written");
        FileOutcome::Written(asset.rel_display())
    }
}

enum FileOutcome {
    Written(String),
    Skipped(String),
    Failed(String),
}

fn write_asset(dest: &Path, asset: &Asset) -> io::Result<()> {
    let target = dest.join(&asset.rel_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &asset.contents)?;
    for sidecar in &asset.sidecars {
        let target = dest.join(&sidecar.rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &sidecar.contents)?;
    }
    Ok(())
}

/// Outcome summary of one pipeline run. Entries are final (post-rename)
/// relative paths in source enumeration order.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub pipeline: &'static str,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl PipelineReport {
    pub fn new(pipeline: &'static str) -> Self {
        Self {
            pipeline,
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.skipped.len() + self.failed.len()
    }

    /// Fold another report into this one, keeping this report's name.
    /// Used by branches composed of sequential sub-copies.
    pub fn merge(&mut self, other: PipelineReport) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}
