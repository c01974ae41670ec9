//! Fetch, reconcile, and submit for one profile.
//!
//! # Design
//! - Every stage failure is folded into the returned [`RunOutcome`]; nothing
//!   here returns an error to the scheduler.
//! - Only the read-only fetch is retried, and only for failures
//!   [`FetchError::is_retryable`] accepts. Submission happens at most once.
//! - Reconciliation failures stop the pipeline before any submission.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gatepass_config::HttpConfig;
use gatepass_core::{
    FetchError, FetchResult, FieldReconciler, FormSnapshot, FormSource, FormSubmitter,
    ReconcileError, RunOutcome, RunStatus, SessionContext, SubmissionPayload, UserProfile,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::render_chain;

/// Bounded retry policy for the fetch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRetry {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Linear backoff step; attempt `n` waits `n * backoff` before the next.
    pub backoff: Duration,
}

impl FetchRetry {
    /// Policy taken from the HTTP tuning.
    #[must_use]
    pub const fn from_http(http: &HttpConfig) -> Self {
        Self {
            attempts: http.fetch_attempts,
            backoff: http.fetch_backoff,
        }
    }

    /// Single attempt, no retry.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    fn delay_after(self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// A payload ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// Reconciled payload.
    pub payload: SubmissionPayload,
    /// Fetch attempts it took to obtain the snapshot.
    pub fetch_attempts: u32,
}

/// A pipeline that stopped before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Status to record.
    pub status: RunStatus,
    /// Diagnostic detail.
    pub detail: String,
    /// Fetch attempts made.
    pub fetch_attempts: u32,
}

/// Per-profile pipeline shared by every task of a firing.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn FormSource>,
    submitter: Arc<dyn FormSubmitter>,
    reconciler: Arc<FieldReconciler>,
    retry: FetchRetry,
}

impl Pipeline {
    /// Assemble a pipeline from its stages.
    #[must_use]
    pub fn new(
        source: Arc<dyn FormSource>,
        submitter: Arc<dyn FormSubmitter>,
        reconciler: FieldReconciler,
        retry: FetchRetry,
    ) -> Self {
        Self {
            source,
            submitter,
            reconciler: Arc::new(reconciler),
            retry,
        }
    }

    /// Fetch and reconcile without submitting.
    ///
    /// # Errors
    ///
    /// Returns a [`StageFailure`] carrying the status the fetch or reconcile
    /// stage ended with.
    pub async fn prepare(&self, profile: &UserProfile) -> Result<Prepared, StageFailure> {
        let (fetched, fetch_attempts) = self.fetch_with_retry(&profile.session).await;
        let snapshot = fetched.map_err(|err| StageFailure {
            status: err.status(),
            detail: fetch_detail(&err),
            fetch_attempts,
        })?;

        let payload = self
            .reconciler
            .reconcile(&snapshot, &profile.overrides, &profile.critical_fields)
            .map_err(|err| StageFailure {
                status: err.status(),
                detail: reconcile_detail(&err),
                fetch_attempts,
            })?;
        debug!(
            fields = payload.fields.len(),
            overrides = profile.overrides.len(),
            "payload reconciled"
        );
        Ok(Prepared {
            payload,
            fetch_attempts,
        })
    }

    /// Run the full pipeline for `profile`, producing its outcome for `run_id`.
    #[instrument(name = "pipeline", skip_all, fields(run_id = %run_id, user_id = %profile.user_id))]
    pub async fn run(&self, run_id: Uuid, profile: &UserProfile) -> RunOutcome {
        let started_at = Utc::now();
        let (status, response_excerpt, detail, fetch_attempts) = match self.prepare(profile).await {
            Ok(prepared) => {
                let submitted = self
                    .submitter
                    .submit(&prepared.payload, &profile.session)
                    .await;
                (
                    submitted.status,
                    submitted.response_excerpt,
                    submitted.detail,
                    prepared.fetch_attempts,
                )
            }
            Err(failure) => (
                failure.status,
                None,
                Some(failure.detail),
                failure.fetch_attempts,
            ),
        };

        let outcome = RunOutcome {
            run_id,
            user_id: profile.user_id.clone(),
            started_at,
            finished_at: Utc::now(),
            status,
            response_excerpt,
            detail,
            fetch_attempts,
        };
        if outcome.status.is_success() {
            info!(
                status = outcome.status.label(),
                elapsed_ms = outcome.elapsed_ms(),
                "gatepass submitted"
            );
        } else {
            warn!(
                status = outcome.status.label(),
                elapsed_ms = outcome.elapsed_ms(),
                fetch_attempts,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "gatepass not submitted"
            );
        }
        outcome
    }

    async fn fetch_with_retry(&self, session: &SessionContext) -> (FetchResult<FormSnapshot>, u32) {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.fetch(session).await {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %fetch_detail(&err),
                        "form fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return (result, attempt),
            }
        }
    }
}

fn fetch_detail(err: &FetchError) -> String {
    match err {
        FetchError::Network {
            kind,
            status: Some(code),
            detail,
        } => format!("{} ({code}): {detail}", kind.as_str()),
        FetchError::Network { kind, detail, .. } => format!("{}: {detail}", kind.as_str()),
        FetchError::Parse { .. } | FetchError::PageTooLarge { .. } => render_chain(err),
    }
}

fn reconcile_detail(err: &ReconcileError) -> String {
    match err {
        ReconcileError::MissingCriticalField { fields } => {
            format!("{err}: {}", fields.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::NetworkErrorKind;
    use gatepass_test_support::mocks::{FetchStep, RecordingSubmitter, ScriptedSource};
    use gatepass_test_support::profiles::{ProfileBuilder, fields};

    const REFERER: &str = "https://portal.example/user/gatepass.php";

    fn pipeline(
        source: &Arc<ScriptedSource>,
        submitter: &Arc<RecordingSubmitter>,
        attempts: u32,
    ) -> Pipeline {
        Pipeline::new(
            Arc::clone(source) as Arc<dyn FormSource>,
            Arc::clone(submitter) as Arc<dyn FormSubmitter>,
            FieldReconciler::new(REFERER, vec!["vehicle_no1".to_string()]),
            FetchRetry {
                attempts,
                backoff: Duration::from_millis(1),
            },
        )
    }

    fn snapshot() -> gatepass_core::FieldMap {
        fields(&[("csrf_token", "t1"), ("tps", "BTPS"), ("vehicle_no1", "")])
    }

    #[tokio::test]
    async fn success_submits_the_reconciled_payload() {
        let source = Arc::new(ScriptedSource::new(snapshot()));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice")
            .override_field("vehicle_no1", "KA01AB1234")
            .override_field("tps", "RTPS")
            .build();

        let outcome = pipeline(&source, &submitter, 3).run(Uuid::nil(), &profile).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.fetch_attempts, 1);
        assert_eq!(outcome.user_id, "alice");
        let payload = submitter.payload_for("alice");
        let payload = payload.as_ref().map(|p| &p.fields);
        assert_eq!(
            payload,
            Some(&fields(&[
                ("csrf_token", "t1"),
                ("tps", "RTPS"),
                ("vehicle_no1", "KA01AB1234"),
            ]))
        );
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried_and_counted() {
        let source = Arc::new(ScriptedSource::new(snapshot()).script(
            "alice",
            vec![
                FetchStep::Network(NetworkErrorKind::Timeout, None),
                FetchStep::Network(NetworkErrorKind::UnexpectedStatus, Some(503)),
            ],
        ));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice")
            .override_field("vehicle_no1", "KA01")
            .build();

        let outcome = pipeline(&source, &submitter, 3).run(Uuid::nil(), &profile).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.fetch_attempts, 3);
        assert_eq!(source.calls("alice"), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_bound() {
        let source = Arc::new(ScriptedSource::new(snapshot()).script(
            "alice",
            vec![FetchStep::Network(NetworkErrorKind::Connect, None); 5],
        ));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice").build();

        let outcome = pipeline(&source, &submitter, 2).run(Uuid::nil(), &profile).await;

        assert_eq!(
            outcome.status,
            RunStatus::NetworkError {
                kind: NetworkErrorKind::Connect
            }
        );
        assert_eq!(outcome.fetch_attempts, 2);
        assert_eq!(source.calls("alice"), 2);
        assert!(submitter.submissions().is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_fetch_is_not_retried() {
        let source = Arc::new(ScriptedSource::new(snapshot()).script(
            "alice",
            vec![FetchStep::Network(NetworkErrorKind::Unauthenticated, None)],
        ));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice").build();

        let outcome = pipeline(&source, &submitter, 3).run(Uuid::nil(), &profile).await;

        assert!(outcome.status.is_unauthenticated());
        assert_eq!(outcome.fetch_attempts, 1);
        assert!(submitter.submissions().is_empty());
    }

    #[tokio::test]
    async fn missing_critical_field_never_reaches_the_submitter() {
        let source = Arc::new(ScriptedSource::new(snapshot()));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice").critical("driver_mob_no").build();

        let outcome = pipeline(&source, &submitter, 3).run(Uuid::nil(), &profile).await;

        assert_eq!(
            outcome.status,
            RunStatus::MissingCriticalField {
                fields: vec!["driver_mob_no".to_string(), "vehicle_no1".to_string()]
            }
        );
        assert!(
            outcome
                .detail
                .is_some_and(|detail| detail.contains("driver_mob_no, vehicle_no1"))
        );
        assert!(submitter.submissions().is_empty());
    }

    #[tokio::test]
    async fn prepare_does_not_submit() {
        let source = Arc::new(ScriptedSource::new(snapshot()));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice")
            .override_field("vehicle_no1", "KA01")
            .build();

        let prepared = pipeline(&source, &submitter, 3).prepare(&profile).await;

        assert!(
            prepared.is_ok_and(|prepared| prepared.payload.headers.values().any(|v| v == REFERER))
        );
        assert!(submitter.submissions().is_empty());
    }

    #[tokio::test]
    async fn parse_failure_is_reported_with_detail() {
        let source =
            Arc::new(ScriptedSource::new(snapshot()).script("alice", vec![FetchStep::Parse]));
        let submitter = Arc::new(RecordingSubmitter::new());
        let profile = ProfileBuilder::new("alice").build();

        let outcome = pipeline(&source, &submitter, 3).run(Uuid::nil(), &profile).await;

        assert_eq!(outcome.status, RunStatus::ParseError);
        assert_eq!(outcome.fetch_attempts, 1);
        assert!(
            outcome
                .detail
                .is_some_and(|detail| detail.starts_with("form page could not be parsed"))
        );
    }
}
