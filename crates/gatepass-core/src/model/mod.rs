//! Core gatepass domain types shared across the workspace.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered field-name → value mapping used for snapshots, overrides and payloads.
///
/// A sorted map keeps payload construction deterministic.
pub type FieldMap = BTreeMap<String, String>;

/// Authenticated identity supplied by the external session layer.
///
/// Read-only to the core; cookie values are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: String,
    cookies: BTreeMap<String, String>,
}

impl SessionContext {
    /// Build a session for `user_id` from a cookie-name → value set.
    #[must_use]
    pub fn new(user_id: impl Into<String>, cookies: BTreeMap<String, String>) -> Self {
        Self {
            user_id: user_id.into(),
            cookies,
        }
    }

    /// Identifier of the user this session belongs to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Render the cookie set as a single `Cookie` request header value.
    ///
    /// Returns `None` when the session carries no cookies.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let rendered = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(rendered)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("user_id", &self.user_id)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-user configuration record, immutable for the duration of a firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable identifier of the user.
    pub user_id: String,
    /// Session used for both the page fetch and the submission.
    pub session: SessionContext,
    /// Caller-supplied values that take precedence over the live page.
    pub overrides: FieldMap,
    /// Fields that must be present and non-empty before submitting.
    pub critical_fields: Vec<String>,
}

impl UserProfile {
    /// Assemble a profile; the session's user id is reused as the profile id.
    #[must_use]
    pub fn new(session: SessionContext, overrides: FieldMap, critical_fields: Vec<String>) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            session,
            overrides,
            critical_fields,
        }
    }
}

/// Field values observed on the live form page at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSnapshot {
    /// When the page was retrieved.
    pub fetched_at: DateTime<Utc>,
    /// Extracted field-name → value mapping.
    pub fields: FieldMap,
}

impl FormSnapshot {
    /// Snapshot stamped with the current time.
    #[must_use]
    pub fn now(fields: FieldMap) -> Self {
        Self {
            fetched_at: Utc::now(),
            fields,
        }
    }
}

/// Final form body and header set sent to the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Form-encoded body fields.
    pub fields: FieldMap,
    /// Request headers; holds exactly the referring page entry.
    pub headers: BTreeMap<String, String>,
}

/// Classification of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// The connection could not be established.
    Connect,
    /// The request exceeded its bounded timeout.
    Timeout,
    /// The session was rejected (login redirect, 401/403, missing form).
    Unauthenticated,
    /// The form page answered with a non-success status.
    UnexpectedStatus,
    /// Any other transport failure (TLS, protocol, body read).
    Transport,
}

impl NetworkErrorKind {
    /// Machine-friendly label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Unauthenticated => "unauthenticated",
            Self::UnexpectedStatus => "unexpected_status",
            Self::Transport => "transport",
        }
    }
}

/// Terminal status of one user's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The submission endpoint answered with a 2xx status.
    Success,
    /// The submission endpoint rejected the request.
    HttpError {
        /// Status code returned.
        code: u16,
    },
    /// Connectivity, timeout, or session failure.
    NetworkError {
        /// Failure classification.
        kind: NetworkErrorKind,
    },
    /// The form page structure could not be used.
    ParseError,
    /// Reconciliation found required fields missing.
    MissingCriticalField {
        /// Missing field names.
        fields: Vec<String>,
    },
}

impl RunStatus {
    /// Whether the run ended in success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the run failed because the session is stale.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::NetworkError {
                kind: NetworkErrorKind::Unauthenticated
            }
        )
    }

    /// Machine-friendly discriminator used for metrics and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::HttpError { .. } => "http_error",
            Self::NetworkError { .. } => "network_error",
            Self::ParseError => "parse_error",
            Self::MissingCriticalField { .. } => "missing_critical_field",
        }
    }
}

/// Write-once record of one user's pipeline run within a firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Identifier of the firing that produced this outcome.
    pub run_id: Uuid,
    /// User the pipeline ran for.
    pub user_id: String,
    /// Pipeline start.
    pub started_at: DateTime<Utc>,
    /// Pipeline end.
    pub finished_at: DateTime<Utc>,
    /// Terminal status.
    pub status: RunStatus,
    /// Bounded excerpt of the submission response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_excerpt: Option<String>,
    /// Diagnostic detail for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Number of form page retrievals attempted.
    pub fetch_attempts: u32,
}

impl RunOutcome {
    /// Wall-clock duration of the pipeline in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Why a scheduled firing did not run any pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The complete profile list could not be loaded.
    ProfilesUnavailable {
        /// Rendered load failure.
        detail: String,
    },
    /// The wait returned too long after the target instant.
    MissedWake {
        /// How late the wake-up was, in milliseconds.
        lateness_ms: i64,
    },
}

impl SkipReason {
    /// Machine-friendly label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ProfilesUnavailable { .. } => "profiles_unavailable",
            Self::MissedWake { .. } => "missed_wake",
        }
    }
}

/// Overall result of a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringVerdict {
    /// Every profile succeeded.
    AllSucceeded,
    /// Some profiles succeeded, some failed.
    Partial,
    /// Every profile failed.
    AllFailed,
    /// No profiles were configured.
    Empty,
}

/// Aggregate of every outcome produced by one firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringReport {
    /// Identifier shared by every outcome in this firing.
    pub run_id: Uuid,
    /// Instant the firing was armed for.
    pub scheduled_for: DateTime<Utc>,
    /// Instant the firing actually started.
    pub fired_at: DateTime<Utc>,
    /// Instant the last outcome was produced.
    pub completed_at: DateTime<Utc>,
    /// One outcome per profile.
    pub outcomes: Vec<RunOutcome>,
}

impl FiringReport {
    /// Number of successful outcomes.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status.is_success())
            .count()
    }

    /// Number of failed outcomes.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Summarise the firing.
    #[must_use]
    pub fn verdict(&self) -> FiringVerdict {
        match (self.success_count(), self.failure_count()) {
            (0, 0) => FiringVerdict::Empty,
            (_, 0) => FiringVerdict::AllSucceeded,
            (0, _) => FiringVerdict::AllFailed,
            _ => FiringVerdict::Partial,
        }
    }

    /// Lateness of the actual fire instant relative to the armed instant.
    #[must_use]
    pub fn lateness_ms(&self) -> i64 {
        (self.fired_at - self.scheduled_for).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn outcome(user: &str, status: RunStatus) -> RunOutcome {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 29, 59).single();
        let at = at.unwrap_or_else(Utc::now);
        RunOutcome {
            run_id: Uuid::nil(),
            user_id: user.to_string(),
            started_at: at,
            finished_at: at + chrono::Duration::milliseconds(420),
            status,
            response_excerpt: None,
            detail: None,
            fetch_attempts: 1,
        }
    }

    fn report(outcomes: Vec<RunOutcome>) -> FiringReport {
        let now = Utc::now();
        FiringReport {
            run_id: Uuid::new_v4(),
            scheduled_for: now,
            fired_at: now + chrono::Duration::milliseconds(3),
            completed_at: now,
            outcomes,
        }
    }

    #[test]
    fn cookie_header_joins_pairs_in_name_order() {
        let cookies = BTreeMap::from([
            ("PHPSESSID".to_string(), "abc".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);
        let session = SessionContext::new("alice", cookies);
        assert_eq!(
            session.cookie_header().as_deref(),
            Some("PHPSESSID=abc; lang=en")
        );
        assert!(
            SessionContext::new("bob", BTreeMap::new())
                .cookie_header()
                .is_none()
        );
    }

    #[test]
    fn session_debug_redacts_cookie_values() {
        let cookies = BTreeMap::from([("PHPSESSID".to_string(), "secret-token".to_string())]);
        let rendered = format!("{:?}", SessionContext::new("alice", cookies));
        assert!(rendered.contains("PHPSESSID"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn profile_takes_user_id_from_session() {
        let profile = UserProfile::new(
            SessionContext::new("carol", BTreeMap::new()),
            FieldMap::new(),
            Vec::new(),
        );
        assert_eq!(profile.user_id, "carol");
    }

    #[test]
    fn verdict_reflects_outcome_mix() {
        assert_eq!(report(Vec::new()).verdict(), FiringVerdict::Empty);
        assert_eq!(
            report(vec![outcome("a", RunStatus::Success)]).verdict(),
            FiringVerdict::AllSucceeded
        );
        assert_eq!(
            report(vec![
                outcome("a", RunStatus::Success),
                outcome("b", RunStatus::ParseError)
            ])
            .verdict(),
            FiringVerdict::Partial
        );
        let failed = report(vec![outcome("a", RunStatus::HttpError { code: 500 })]);
        assert_eq!(failed.verdict(), FiringVerdict::AllFailed);
        assert_eq!(failed.failure_count(), 1);
        assert_eq!(failed.lateness_ms(), 3);
    }

    #[test]
    fn run_status_serializes_with_status_tag() -> anyhow::Result<()> {
        let status = RunStatus::NetworkError {
            kind: NetworkErrorKind::Unauthenticated,
        };
        let value = serde_json::to_value(&status)?;
        assert_eq!(value["status"], "network_error");
        assert_eq!(value["status"], status.label());
        assert_eq!(value["kind"], "unauthenticated");
        assert!(status.is_unauthenticated());
        assert_eq!(outcome("a", RunStatus::Success).elapsed_ms(), 420);
        Ok(())
    }
}
