//! Error types for the fetch and reconcile stages.
//!
//! # Design
//! - Constant error messages; context travels in fields.
//! - Every stage error maps onto exactly one [`RunStatus`] so a pipeline can
//!   fold failures into its outcome instead of propagating them.

use std::error::Error;

use thiserror::Error;

use crate::markup::MarkupError;
use crate::model::{NetworkErrorKind, RunStatus};

/// Result alias for form page retrieval.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result alias for field reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Failures raised while retrieving and parsing the target form page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be completed or the session was rejected.
    #[error("form page request failed")]
    Network {
        /// Classification of the failure.
        kind: NetworkErrorKind,
        /// HTTP status when the server answered.
        status: Option<u16>,
        /// Diagnostic detail (never contains cookie values).
        detail: String,
    },
    /// The page body was not usable markup.
    #[error("form page could not be parsed")]
    Parse {
        /// Underlying markup failure.
        #[source]
        source: MarkupError,
    },
    /// The page body exceeded the configured size bound.
    #[error("form page exceeded size limit")]
    PageTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl FetchError {
    /// Construct a network failure.
    #[must_use]
    pub fn network(kind: NetworkErrorKind, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Network {
            kind,
            status,
            detail: detail.into(),
        }
    }

    /// Construct the distinguished "session rejected" failure.
    #[must_use]
    pub fn unauthenticated(detail: impl Into<String>) -> Self {
        Self::network(NetworkErrorKind::Unauthenticated, None, detail)
    }

    /// Whether repeating the read-only fetch could plausibly succeed.
    ///
    /// Unauthenticated and parse failures are never retried: the session or
    /// the page will not change within one firing.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { kind, status, .. } => match kind {
                NetworkErrorKind::Connect
                | NetworkErrorKind::Timeout
                | NetworkErrorKind::Transport => true,
                NetworkErrorKind::UnexpectedStatus => matches!(status, Some(code) if *code >= 500),
                NetworkErrorKind::Unauthenticated => false,
            },
            Self::Parse { .. } | Self::PageTooLarge { .. } => false,
        }
    }

    /// Outcome status recorded when the fetch stage gives up.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Network { kind, .. } => RunStatus::NetworkError { kind: *kind },
            Self::Parse { .. } | Self::PageTooLarge { .. } => RunStatus::ParseError,
        }
    }
}

impl From<MarkupError> for FetchError {
    fn from(source: MarkupError) -> Self {
        Self::Parse { source }
    }
}

/// Failures raised while merging a snapshot with user overrides.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// One or more critical fields were absent or empty in the merged payload.
    #[error("critical fields missing from payload")]
    MissingCriticalField {
        /// Missing field names, sorted and de-duplicated.
        fields: Vec<String>,
    },
}

impl ReconcileError {
    /// Outcome status recorded for the failure.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        match self {
            Self::MissingCriticalField { fields } => RunStatus::MissingCriticalField {
                fields: fields.clone(),
            },
        }
    }
}

/// Failure to produce the complete profile list for a firing.
#[derive(Debug, Error)]
pub enum ProfileLoadError {
    /// The backing source could not be read or decoded.
    #[error("profile source unavailable")]
    Unavailable {
        /// Identifier of the source that failed.
        source_name: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ProfileLoadError {
    /// Wrap an arbitrary source error.
    pub fn unavailable(
        source_name: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Unavailable {
            source_name,
            source: source.into(),
        }
    }
}
