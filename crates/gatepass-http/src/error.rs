//! Error types for HTTP adapter construction.
//!
//! Request-time failures are never surfaced here: the fetcher maps them to
//! [`gatepass_core::FetchError`] and the submitter folds them into a
//! [`gatepass_core::RunStatus`].

use thiserror::Error;

/// Failure to build an HTTP adapter.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The underlying `reqwest` client could not be constructed.
    #[error("failed to build HTTP client")]
    ClientBuild {
        /// Adapter being constructed.
        operation: &'static str,
        /// Source `reqwest` error.
        source: reqwest::Error,
    },
}

/// Convenience alias for adapter construction results.
pub type HttpResult<T> = Result<T, HttpError>;
