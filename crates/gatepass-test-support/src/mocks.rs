//! Scripted doubles for the service traits.
//!
//! # Design
//! - Each double records what it saw so tests assert on calls, not logs.
//! - Scripts are per user and consumed in order; once a script runs out the
//!   double falls back to its default behaviour.
//! - Optional delays let scheduler tests observe concurrency limits.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::{
    FetchError, FetchResult, FieldMap, FiringReport, FormSnapshot, FormSource, FormSubmitter,
    MarkupError, NetworkErrorKind, OutcomeReporter, ProfileLoadError, ProfileSource, RunOutcome,
    RunStatus, SessionContext, SkipReason, SubmissionPayload, SubmitOutcome, UserProfile,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum FetchStep {
    /// Return a snapshot with these fields.
    Snapshot(FieldMap),
    /// Fail with a network error.
    Network(NetworkErrorKind, Option<u16>),
    /// Fail as unparsable markup.
    Parse,
}

impl FetchStep {
    fn into_result(self) -> FetchResult<FormSnapshot> {
        match self {
            Self::Snapshot(fields) => Ok(FormSnapshot::now(fields)),
            Self::Network(kind, status) => Err(FetchError::network(kind, status, "scripted")),
            Self::Parse => Err(FetchError::Parse {
                source: MarkupError::NoElements,
            }),
        }
    }
}

/// [`FormSource`] replaying scripted results per user.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    default_fields: FieldMap,
    scripts: Mutex<BTreeMap<String, VecDeque<FetchStep>>>,
    calls: Mutex<BTreeMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    /// Source answering every fetch with a snapshot of `default_fields`.
    #[must_use]
    pub fn new(default_fields: FieldMap) -> Self {
        Self {
            default_fields,
            ..Self::default()
        }
    }

    /// Queue `steps` for `user_id`, consumed before the default applies.
    #[must_use]
    pub fn script(self, user_id: &str, steps: Vec<FetchStep>) -> Self {
        lock(&self.scripts).insert(user_id.to_string(), steps.into());
        self
    }

    /// Sleep `delay` before answering each fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fetches observed for `user_id`.
    #[must_use]
    pub fn calls(&self, user_id: &str) -> usize {
        lock(&self.calls).get(user_id).copied().unwrap_or(0)
    }

    /// Fetches observed across all users.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl FormSource for ScriptedSource {
    async fn fetch(&self, session: &SessionContext) -> FetchResult<FormSnapshot> {
        *lock(&self.calls)
            .entry(session.user_id().to_string())
            .or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let step = lock(&self.scripts)
            .get_mut(session.user_id())
            .and_then(VecDeque::pop_front);
        step.map_or_else(
            || Ok(FormSnapshot::now(self.default_fields.clone())),
            FetchStep::into_result,
        )
    }
}

/// [`FormSubmitter`] recording payloads and answering with scripted statuses.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    statuses: Mutex<BTreeMap<String, RunStatus>>,
    submissions: Mutex<Vec<(String, SubmissionPayload)>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingSubmitter {
    /// Submitter accepting every payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer submissions for `user_id` with `status`.
    #[must_use]
    pub fn respond(self, user_id: &str, status: RunStatus) -> Self {
        lock(&self.statuses).insert(user_id.to_string(), status);
        self
    }

    /// Hold each submission for `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every submission seen, in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<(String, SubmissionPayload)> {
        lock(&self.submissions).clone()
    }

    /// Payload submitted for `user_id`, if any.
    #[must_use]
    pub fn payload_for(&self, user_id: &str) -> Option<SubmissionPayload> {
        lock(&self.submissions)
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, payload)| payload.clone())
    }

    /// Highest number of submissions observed in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FormSubmitter for RecordingSubmitter {
    async fn submit(&self, payload: &SubmissionPayload, session: &SessionContext) -> SubmitOutcome {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        lock(&self.submissions).push((session.user_id().to_string(), payload.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let status = lock(&self.statuses)
            .get(session.user_id())
            .cloned()
            .unwrap_or(RunStatus::Success);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        SubmitOutcome {
            response_excerpt: Some(format!("scripted {}", status.label())),
            status,
            detail: None,
        }
    }
}

/// [`OutcomeReporter`] keeping everything it receives.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    outcomes: Mutex<Vec<RunOutcome>>,
    reports: Mutex<Vec<FiringReport>>,
    skips: Mutex<Vec<(DateTime<Utc>, SkipReason)>>,
}

impl RecordingReporter {
    /// Empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes in the order they were recorded.
    #[must_use]
    pub fn outcomes(&self) -> Vec<RunOutcome> {
        lock(&self.outcomes).clone()
    }

    /// Outcome recorded for `user_id`, if any.
    #[must_use]
    pub fn outcome_for(&self, user_id: &str) -> Option<RunOutcome> {
        lock(&self.outcomes)
            .iter()
            .find(|outcome| outcome.user_id == user_id)
            .cloned()
    }

    /// Completed firing reports.
    #[must_use]
    pub fn reports(&self) -> Vec<FiringReport> {
        lock(&self.reports).clone()
    }

    /// Skipped firings.
    #[must_use]
    pub fn skips(&self) -> Vec<(DateTime<Utc>, SkipReason)> {
        lock(&self.skips).clone()
    }
}

#[async_trait]
impl OutcomeReporter for RecordingReporter {
    async fn record(&self, outcome: &RunOutcome) {
        lock(&self.outcomes).push(outcome.clone());
    }

    async fn firing_completed(&self, report: &FiringReport) {
        lock(&self.reports).push(report.clone());
    }

    async fn firing_skipped(&self, scheduled_for: DateTime<Utc>, reason: &SkipReason) {
        lock(&self.skips).push((scheduled_for, reason.clone()));
    }
}

/// [`ProfileSource`] that fails every load.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProfiles;

#[async_trait]
impl ProfileSource for UnavailableProfiles {
    async fn load(&self) -> Result<Vec<UserProfile>, ProfileLoadError> {
        Err(ProfileLoadError::unavailable(
            "scripted",
            "profile store offline",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{fields, session};

    #[tokio::test]
    async fn scripted_source_replays_then_defaults() -> anyhow::Result<()> {
        let source = ScriptedSource::new(fields(&[("a", "1")])).script(
            "alice",
            vec![FetchStep::Network(NetworkErrorKind::Timeout, None), FetchStep::Parse],
        );
        let alice = session("alice", &[("sid", "1")]);

        assert!(source.fetch(&alice).await.is_err_and(|err| err.is_retryable()));
        assert!(source.fetch(&alice).await.is_err_and(|err| !err.is_retryable()));
        assert_eq!(source.fetch(&alice).await?.fields, fields(&[("a", "1")]));
        assert_eq!(source.calls("alice"), 3);
        assert_eq!(source.calls("bob"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn recording_submitter_uses_scripted_status() {
        let submitter =
            RecordingSubmitter::new().respond("bob", RunStatus::HttpError { code: 500 });
        let payload = SubmissionPayload {
            fields: fields(&[("x", "1")]),
            headers: BTreeMap::new(),
        };

        let alice = submitter.submit(&payload, &session("alice", &[("s", "1")])).await;
        let bob = submitter.submit(&payload, &session("bob", &[("s", "1")])).await;

        assert_eq!(alice.status, RunStatus::Success);
        assert_eq!(bob.status, RunStatus::HttpError { code: 500 });
        assert_eq!(submitter.submissions().len(), 2);
        assert_eq!(submitter.peak_in_flight(), 1);
        assert!(submitter.payload_for("bob").is_some());
    }

    #[tokio::test]
    async fn unavailable_profiles_always_fail() {
        assert!(UnavailableProfiles.load().await.is_err());
    }
}
