//! Outcome sinks.
//!
//! # Design
//! - Reporters never fail the firing: sink errors are logged and dropped.
//! - Every sink tolerates concurrent `record` calls from running pipelines.
//! - [`CompositeReporter`] forwards to each sink in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::{FiringReport, OutcomeReporter, RunOutcome, SkipReason};
use gatepass_telemetry::Metrics;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Writes outcomes and firing summaries to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[async_trait]
impl OutcomeReporter for TracingReporter {
    async fn record(&self, outcome: &RunOutcome) {
        if outcome.status.is_success() {
            info!(
                run_id = %outcome.run_id,
                user_id = %outcome.user_id,
                status = outcome.status.label(),
                elapsed_ms = outcome.elapsed_ms(),
                "outcome recorded"
            );
        } else {
            warn!(
                run_id = %outcome.run_id,
                user_id = %outcome.user_id,
                status = outcome.status.label(),
                elapsed_ms = outcome.elapsed_ms(),
                fetch_attempts = outcome.fetch_attempts,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "outcome recorded"
            );
        }
        if outcome.status.is_unauthenticated() {
            warn!(
                user_id = %outcome.user_id,
                "session rejected; cookies need to be refreshed"
            );
        }
    }

    async fn firing_completed(&self, report: &FiringReport) {
        info!(
            run_id = %report.run_id,
            verdict = ?report.verdict(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            lateness_ms = report.lateness_ms(),
            "firing summary"
        );
    }

    async fn firing_skipped(&self, scheduled_for: DateTime<Utc>, reason: &SkipReason) {
        warn!(
            scheduled_for = %scheduled_for,
            reason = reason.label(),
            "firing skipped"
        );
    }
}

/// Appends every outcome as one JSON object per line.
#[derive(Debug)]
pub struct JsonlReporter {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlReporter {
    /// Open `path` for appending, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the file cannot be opened.
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| AppError::io("outcome_log.open", Some(path.clone()), err))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File receiving the outcomes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutcomeReporter for JsonlReporter {
    async fn record(&self, outcome: &RunOutcome) {
        let mut line = match serde_json::to_vec(outcome) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, user_id = %outcome.user_id, "outcome not serialisable");
                return;
            }
        };
        line.push(b'\n');

        let mut file = self.file.lock().await;
        let written = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(
                error = %err,
                path = %self.path.display(),
                user_id = %outcome.user_id,
                "outcome log write failed"
            );
        }
    }
}

/// Feeds outcomes and firings into the Prometheus registry.
#[derive(Clone)]
pub struct MetricsReporter {
    metrics: Metrics,
}

impl MetricsReporter {
    /// Reporter updating `metrics`.
    #[must_use]
    pub const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl OutcomeReporter for MetricsReporter {
    async fn record(&self, outcome: &RunOutcome) {
        self.metrics.inc_outcome(outcome.status.label());
    }

    async fn firing_completed(&self, report: &FiringReport) {
        self.metrics.inc_firing();
        let elapsed = (report.completed_at - report.fired_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.metrics.observe_firing(elapsed, report.outcomes.len());
        match self.metrics.render() {
            Ok(text) => debug!(metrics = %text, "metrics after firing"),
            Err(err) => warn!(error = %err, "metrics could not be rendered"),
        }
    }

    async fn firing_skipped(&self, _scheduled_for: DateTime<Utc>, reason: &SkipReason) {
        self.metrics.inc_firing_skipped(reason.label());
    }
}

/// Forwards every call to each sink in order.
#[derive(Clone, Default)]
pub struct CompositeReporter {
    sinks: Vec<Arc<dyn OutcomeReporter>>,
}

impl CompositeReporter {
    /// Empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn OutcomeReporter>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl OutcomeReporter for CompositeReporter {
    async fn record(&self, outcome: &RunOutcome) {
        for sink in &self.sinks {
            sink.record(outcome).await;
        }
    }

    async fn firing_completed(&self, report: &FiringReport) {
        for sink in &self.sinks {
            sink.firing_completed(report).await;
        }
    }

    async fn firing_skipped(&self, scheduled_for: DateTime<Utc>, reason: &SkipReason) {
        for sink in &self.sinks {
            sink.firing_skipped(scheduled_for, reason).await;
        }
    }
}
