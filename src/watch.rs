//! Source watching for the dev loop.
//!
//! Watches the source tree recursively and reruns the pipeline that owns a
//! changed path. Each branch has a [`WatchProfile`]: a compiled glob set
//! over root-relative paths. The pages profile includes the fragments
//! directory, and the styles profile covers the whole styles tree
//! including partials and vendor sheets, since those feed compilation
//! through `@import` even though they are never compiled directly.
//!
//! Events are debounced: after the first match, the loop sleeps briefly
//! and drains whatever else arrived, so an editor save burst reruns each
//! affected pipeline once. Reruns always use development mode; watch is
//! part of the dev server loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use globset::GlobSet;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{Config, Mode};
use crate::fileset::{FileSetError, build_set};
use crate::lint;
use crate::notifier::Notifier;
use crate::tasks::{self, PipelineKind};

/// Quiet window drained after the first matching event.
const DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    FileSet(#[from] FileSetError),
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

// =============================================================================
// Shutdown signal
// =============================================================================

/// Broadcast shutdown flag for the long-running dev tasks. Cloneable;
/// every holder can trigger, every subscriber wakes up.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Watch profiles
// =============================================================================

/// Compiled path-interest set for one pipeline, over root-relative
/// forward-slash paths like `src/styles/_base.sass`.
pub struct WatchProfile {
    kind: PipelineKind,
    set: GlobSet,
}

impl WatchProfile {
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn matches(&self, rel: &str) -> bool {
        self.set.is_match(rel)
    }
}

/// Build the per-pipeline profiles from the configured directory layout.
pub fn build_profiles(config: &Config) -> Result<Vec<WatchProfile>, FileSetError> {
    let src = &config.paths.source;

    let mut pages = prefix_globs(&[src, &config.pages.dir], &config.pages.sources);
    pages.extend(prefix_globs(
        &[src, &config.pages.fragments_dir],
        &config.pages.sources,
    ));

    let styles = prefix_globs(&[src, &config.styles.dir], &config.styles.sources);
    let images = prefix_globs(&[src, &config.images.dir], &config.images.sources);
    let scripts = prefix_globs(&[src, &config.scripts.dir], &config.scripts.sources);

    Ok(vec![
        WatchProfile {
            kind: PipelineKind::Pages,
            set: build_set(&pages)?,
        },
        WatchProfile {
            kind: PipelineKind::Styles,
            set: build_set(&styles)?,
        },
        WatchProfile {
            kind: PipelineKind::Images,
            set: build_set(&images)?,
        },
        WatchProfile {
            kind: PipelineKind::Scripts,
            set: build_set(&scripts)?,
        },
    ])
}

fn prefix_globs(dirs: &[&String], patterns: &[String]) -> Vec<String> {
    let prefix = dirs
        .iter()
        .map(|d| d.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/");
    patterns
        .iter()
        .map(|p| format!("{prefix}/{p}"))
        .collect()
}

// =============================================================================
// Watch loop
// =============================================================================

/// Watch the source tree and rerun matching pipelines until `shutdown`
/// triggers.
pub async fn watch_sources(
    config: Arc<Config>,
    notifier: Arc<Notifier>,
    shutdown: Shutdown,
) -> Result<(), WatchError> {
    let profiles = build_profiles(&config)?;
    let root = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());
    let source_root = config.source_dir();

    // Channel from the blocking notify callback into the async loop.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("sitewright: file watch error: {err}");
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(&source_root, RecursiveMode::Recursive)?;
    tracing::info!(root = %source_root.display(), "watching sources");

    let mut shutdown_rx = shutdown.subscribe();
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { break };
                let mut pending = kinds_for_event(&root, &event, &profiles);
                // drain the save burst so each pipeline reruns once
                tokio::time::sleep(DEBOUNCE).await;
                while let Ok(event) = event_rx.try_recv() {
                    for kind in kinds_for_event(&root, &event, &profiles) {
                        if !pending.contains(&kind) {
                            pending.push(kind);
                        }
                    }
                }
                for kind in pending {
                    rerun(kind, &config, &notifier).await;
                }
            }
        }
    }

    tracing::debug!("watch loop stopped");
    Ok(())
}

fn kinds_for_event(root: &Path, event: &Event, profiles: &[WatchProfile]) -> Vec<PipelineKind> {
    let mut kinds = Vec::new();
    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            continue;
        };
        for profile in profiles {
            if profile.matches(&rel) && !kinds.contains(&profile.kind()) {
                tracing::debug!(pipeline = profile.kind().name(), path = %rel, "watch match");
                kinds.push(profile.kind());
            }
        }
    }
    kinds
}

async fn rerun(kind: PipelineKind, config: &Arc<Config>, notifier: &Arc<Notifier>) {
    tracing::info!(pipeline = kind.name(), "change detected, rebuilding");
    let task_config = Arc::clone(config);
    let task_notifier = Arc::clone(notifier);
    let joined = tokio::task::spawn_blocking(move || {
        tasks::run_pipeline(kind, &task_config, Mode::Development, &task_notifier)
    })
    .await;

    match joined {
        Ok(Ok(report)) => {
            tracing::info!(
                pipeline = kind.name(),
                written = report.written.len(),
                failed = report.failed.len(),
                "rebuilt"
            );
        }
        Ok(Err(err)) => notifier.notify(kind.name(), None, err.to_string()),
        Err(err) => tracing::error!(pipeline = kind.name(), "rebuild worker panicked: {err}"),
    }

    if kind == PipelineKind::Scripts {
        relint(config).await;
    }
}

/// Scripts changed, refresh the lint findings. The mtime cache keeps this
/// cheap for everything that didn't change.
async fn relint(config: &Arc<Config>) {
    let config = Arc::clone(config);
    let joined = tokio::task::spawn_blocking(move || lint::run(&config)).await;
    match joined {
        Ok(Ok(report)) if report.is_clean() => {
            tracing::info!(checked = report.checked, "lint clean");
        }
        Ok(Ok(report)) => {
            tracing::warn!(
                errors = report.error_count(),
                warnings = report.warning_count(),
                "lint findings"
            );
            for file in report.files_with_findings() {
                for m in &file.outcome.messages {
                    tracing::warn!("{}:{}:{} {} ({})", file.rel, m.line, m.column, m.message, m.rule);
                }
            }
        }
        Ok(Err(err)) => tracing::warn!(%err, "lint run failed"),
        Err(err) => tracing::error!("lint worker panicked: {err}"),
    }
}

/// Root-relative forward-slash form of `path`, when it sits under `root`.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
