//! Per-file error notifier.
//!
//! Pipelines route per-file transformation failures here instead of
//! aborting: the failing file is dropped from the run, the alert is logged
//! immediately, and the collected alerts surface in the build summary.
//! Structural failures (unreadable file sets, broken glob patterns, a
//! template engine that will not construct) do not pass through the
//! notifier; those abort their pipeline with a typed error.

use std::sync::Mutex;

/// A single routed per-file failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineAlert {
    /// Pipeline that dropped the file.
    pub pipeline: &'static str,
    /// Set-relative source path, when the failure is tied to one file.
    pub file: Option<String>,
    /// Human-readable failure description.
    pub message: String,
}

/// Thread-safe alert collector shared across pipelines.
#[derive(Debug, Default)]
pub struct Notifier {
    alerts: Mutex<Vec<PipelineAlert>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alert and log it immediately.
    pub fn notify(&self, pipeline: &'static str, file: Option<String>, message: impl Into<String>) {
        let message = message.into();
        match &file {
            Some(f) => tracing::error!(pipeline, file = %f, "{message}"),
            None => tracing::error!(pipeline, "{message}"),
        }
        self.lock().push(PipelineAlert {
            pipeline,
            file,
            message,
        });
    }

    /// Snapshot of all alerts recorded so far, in arrival order.
    pub fn alerts(&self) -> Vec<PipelineAlert> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PipelineAlert>> {
        match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
