//! Error types for configuration and profile loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// A configuration value failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field (environment variable) that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A profile record failed validation.
    #[error("invalid profile record")]
    InvalidProfile {
        /// Zero-based position of the record in the list.
        index: usize,
        /// Field of the record that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Two profile records share a user id.
    #[error("duplicate profile user id")]
    DuplicateProfile {
        /// Repeated identifier.
        user_id: String,
    },
    /// A JSON document could not be decoded.
    #[error("json decoding failed")]
    Json {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.into()),
            reason,
        }
    }

    pub(crate) const fn invalid_profile(
        index: usize,
        field: &'static str,
        reason: &'static str,
    ) -> Self {
        Self::InvalidProfile {
            index,
            field,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
