//! Async seams implemented by the HTTP, configuration, and reporting layers.
//!
//! The scheduler depends only on these traits, so pipelines can be exercised
//! against scripted doubles without a network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{FetchResult, ProfileLoadError};
use crate::model::{
    FiringReport, FormSnapshot, RunOutcome, RunStatus, SessionContext, SkipReason,
    SubmissionPayload, UserProfile,
};

/// Retrieves the live form page under a session and extracts its fields.
#[async_trait]
pub trait FormSource: Send + Sync {
    /// Perform one live retrieval; implementations never cache.
    async fn fetch(&self, session: &SessionContext) -> FetchResult<FormSnapshot>;
}

/// Classified result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Terminal status of the submission.
    pub status: RunStatus,
    /// Bounded excerpt of the response body, when one was read.
    pub response_excerpt: Option<String>,
    /// Diagnostic detail for failures.
    pub detail: Option<String>,
}

impl SubmitOutcome {
    /// Outcome with a status and no diagnostics.
    #[must_use]
    pub const fn status(status: RunStatus) -> Self {
        Self {
            status,
            response_excerpt: None,
            detail: None,
        }
    }
}

/// Sends the reconciled payload to the submission endpoint exactly once.
#[async_trait]
pub trait FormSubmitter: Send + Sync {
    /// Submit `payload` under `session`; failures are classified, never raised.
    async fn submit(&self, payload: &SubmissionPayload, session: &SessionContext) -> SubmitOutcome;
}

/// Sink for per-user outcomes and per-firing summaries.
///
/// `record` is invoked concurrently from running pipelines, so implementations
/// must tolerate parallel calls.
#[async_trait]
pub trait OutcomeReporter: Send + Sync {
    /// Receive one finished outcome.
    async fn record(&self, outcome: &RunOutcome);

    /// Receive the complete firing once every outcome has been produced.
    async fn firing_completed(&self, report: &FiringReport) {
        let _ = report;
    }

    /// Learn that a scheduled firing did not run.
    async fn firing_skipped(&self, scheduled_for: DateTime<Utc>, reason: &SkipReason) {
        let _ = (scheduled_for, reason);
    }
}

/// Produces the complete profile list for a firing.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Load every profile or fail; partial lists are never returned.
    async fn load(&self) -> Result<Vec<UserProfile>, ProfileLoadError>;
}
