//! # Design
//!
//! - Centralize application-level errors for bootstrap and commands.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Map each variant to a process exit code: operator mistakes exit 2,
//!   runtime failures exit 3.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: gatepass_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: gatepass_telemetry::TelemetryError,
    },
    /// HTTP clients could not be built.
    #[error("http client construction failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP error.
        source: gatepass_http::HttpError,
    },
    /// The scheduler stopped with an error.
    #[error("scheduler operation failed")]
    Scheduler {
        /// Operation identifier.
        operation: &'static str,
        /// Source scheduler error.
        source: gatepass_scheduler::SchedulerError,
    },
    /// Profiles could not be loaded.
    #[error("profile loading failed")]
    Profiles {
        /// Operation identifier.
        operation: &'static str,
        /// Source profile error.
        source: gatepass_core::ProfileLoadError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// Serialising command output failed.
    #[error("json serialization failed")]
    Json {
        /// Operation identifier.
        operation: &'static str,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// No profile carries the requested user id.
    #[error("unknown user")]
    UnknownUser {
        /// Requested user id.
        user_id: String,
    },
    /// A preview stopped before producing a payload.
    #[error("preview failed")]
    PreviewFailed {
        /// User the preview ran for.
        user_id: String,
        /// Status label of the failed stage.
        status: &'static str,
        /// Diagnostic detail.
        detail: String,
    },
    /// A manual firing was skipped.
    #[error("firing skipped")]
    FiringSkipped {
        /// Skip reason label.
        reason: &'static str,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: gatepass_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: gatepass_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, source: gatepass_http::HttpError) -> Self {
        Self::Http { operation, source }
    }

    pub(crate) const fn scheduler(
        operation: &'static str,
        source: gatepass_scheduler::SchedulerError,
    ) -> Self {
        Self::Scheduler { operation, source }
    }

    pub(crate) const fn profiles(
        operation: &'static str,
        source: gatepass_core::ProfileLoadError,
    ) -> Self {
        Self::Profiles { operation, source }
    }

    pub(crate) const fn io(
        operation: &'static str,
        path: Option<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path,
            source,
        }
    }

    pub(crate) const fn json(operation: &'static str, source: serde_json::Error) -> Self {
        Self::Json { operation, source }
    }

    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Profiles { .. } | Self::UnknownUser { .. } => 2,
            Self::Telemetry { .. }
            | Self::Http { .. }
            | Self::Scheduler { .. }
            | Self::Io { .. }
            | Self::Json { .. }
            | Self::PreviewFailed { .. }
            | Self::FiringSkipped { .. } => 3,
        }
    }

    /// One-line rendering including context and every source.
    #[must_use]
    pub fn display_message(&self) -> String {
        let mut message = match self {
            Self::Config { operation, .. }
            | Self::Telemetry { operation, .. }
            | Self::Http { operation, .. }
            | Self::Scheduler { operation, .. }
            | Self::Profiles { operation, .. }
            | Self::Json { operation, .. } => format!("{self} ({operation})"),
            Self::Io {
                operation,
                path: Some(path),
                ..
            } => format!("{self} ({operation}, {})", path.display()),
            Self::Io { operation, .. } => format!("{self} ({operation})"),
            Self::UnknownUser { user_id } => format!("{self}: {user_id}"),
            Self::PreviewFailed {
                user_id,
                status,
                detail,
            } => format!("{self} for {user_id}: {status}: {detail}"),
            Self::FiringSkipped { reason } => format!("{self}: {reason}"),
        };
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
