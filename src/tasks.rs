//! Task orchestration.
//!
//! A full build is: clean the output directory, sync the vendor fonts
//! (the style sources import the vendor SCSS, so it must land first),
//! then run the four asset pipelines in parallel alongside the lint pass.
//! Pipelines are CPU/filesystem work, so each branch runs on the blocking
//! pool.
//!
//! Branches are isolated: a pipeline that fails structurally (bad glob,
//! unreadable tree) is reported through the [`Notifier`] and the other
//! branches still complete. [`build`] itself only errors when the clean
//! fails or a worker panics.

use std::io;
use std::sync::Arc;

use futures_util::future;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{Config, Mode};
use crate::lint::{self, LintReport};
use crate::notifier::{Notifier, PipelineAlert};
use crate::pipeline::{PipelineError, PipelineReport};
use crate::{fonts, images, pages, scripts, styles};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("worker panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The named build branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Pages,
    Styles,
    Images,
    Scripts,
    Fonts,
}

impl PipelineKind {
    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::Pages => "pages",
            PipelineKind::Styles => "styles",
            PipelineKind::Images => "images",
            PipelineKind::Scripts => "scripts",
            PipelineKind::Fonts => "fonts",
        }
    }
}

/// Run one pipeline to completion on the current thread.
pub fn run_pipeline(
    kind: PipelineKind,
    config: &Config,
    mode: Mode,
    notifier: &Notifier,
) -> Result<PipelineReport, PipelineError> {
    match kind {
        PipelineKind::Pages => pages::run(config, mode, notifier),
        PipelineKind::Styles => styles::run(config, mode, notifier),
        PipelineKind::Images => images::run(config, mode, notifier),
        PipelineKind::Scripts => scripts::run(config, mode, notifier),
        PipelineKind::Fonts => fonts::run(config, notifier),
    }
}

/// Everything a finished build has to say.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub reports: Vec<PipelineReport>,
    pub lint: Option<LintReport>,
    pub alerts: Vec<PipelineAlert>,
}

impl BuildSummary {
    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.alerts.is_empty() && self.failed() == 0
    }
}

/// Delete the output directory. Missing output is not an error.
pub fn clean(config: &Config) -> io::Result<()> {
    let output = config.output_dir();
    match std::fs::remove_dir_all(&output) {
        Ok(()) => {
            tracing::info!(path = %output.display(), "output directory removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Clean and rebuild everything for `mode`.
pub async fn build(
    config: &Arc<Config>,
    mode: Mode,
    notifier: &Arc<Notifier>,
) -> Result<BuildSummary, TaskError> {
    clean(config)?;
    let mut summary = BuildSummary::default();

    // vendor SCSS must be in place before the styles branch compiles
    let fonts = spawn_pipeline(PipelineKind::Fonts, config, mode, notifier);
    collect_branch(fonts.await?, &mut summary, notifier);

    let branches = vec![
        spawn_pipeline(PipelineKind::Pages, config, mode, notifier),
        spawn_pipeline(PipelineKind::Styles, config, mode, notifier),
        spawn_pipeline(PipelineKind::Images, config, mode, notifier),
        spawn_pipeline(PipelineKind::Scripts, config, mode, notifier),
    ];
    let lint_branch = spawn_lint(config);

    for joined in future::join_all(branches).await {
        collect_branch(joined?, &mut summary, notifier);
    }
    match lint_branch.await? {
        Ok(report) => summary.lint = Some(report),
        Err(err) => notifier.notify("lint", None, err.to_string()),
    }

    summary.alerts = notifier.alerts();
    tracing::info!(
        written = summary.written(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        "build finished"
    );
    Ok(summary)
}

type BranchResult = (PipelineKind, Result<PipelineReport, PipelineError>);

fn spawn_pipeline(
    kind: PipelineKind,
    config: &Arc<Config>,
    mode: Mode,
    notifier: &Arc<Notifier>,
) -> JoinHandle<BranchResult> {
    let config = Arc::clone(config);
    let notifier = Arc::clone(notifier);
    tokio::task::spawn_blocking(move || (kind, run_pipeline(kind, &config, mode, &notifier)))
}

fn spawn_lint(config: &Arc<Config>) -> JoinHandle<Result<LintReport, lint::LintError>> {
    let config = Arc::clone(config);
    tokio::task::spawn_blocking(move || lint::run(&config))
}

fn collect_branch(result: BranchResult, summary: &mut BuildSummary, notifier: &Notifier) {
    match result {
        (_, Ok(report)) => summary.reports.push(report),
        (kind, Err(err)) => notifier.notify(kind.name(), None, err.to_string()),
    }
}
