//! Error types for the scheduler.
//!
//! # Design
//! - Only misconfiguration surfaces here; per-user stage failures become
//!   outcomes and skipped firings become [`gatepass_core::SkipReason`]s.

use std::error::Error as StdError;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use gatepass_config::ConfigError;
use thiserror::Error;

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Failures that stop the scheduler loop.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configured trigger time is not a valid wall-clock time.
    #[error("invalid trigger time")]
    Trigger {
        /// Underlying validation failure.
        #[source]
        source: ConfigError,
    },
    /// No day in the search window has a valid local instant for the trigger.
    #[error("trigger time has no valid local instant")]
    NoValidInstant {
        /// Instant the search started from.
        after: DateTime<Utc>,
        /// Local trigger time.
        trigger: NaiveTime,
        /// Timezone the trigger is interpreted in.
        timezone: Tz,
    },
}

/// Render an error and its sources on one line.
pub(crate) fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::ProfileLoadError;

    #[test]
    fn chain_includes_sources() {
        let err = ProfileLoadError::unavailable("file", "users.json missing");
        assert_eq!(
            render_chain(&err),
            "profile source unavailable: users.json missing"
        );
    }
}
