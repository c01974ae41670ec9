//! Default values for optional configuration.
//!
//! # Design
//! - Keep every fallback in one place so documentation and code agree.
//! - Time-based defaults are explicit durations for auditability.
#![allow(clippy::redundant_pub_crate)]

use std::time::Duration;

/// IANA timezone the trigger instant is interpreted in.
pub(crate) const TIMEZONE: &str = "Asia/Kolkata";
/// Local wall-clock trigger instant.
pub(crate) const TRIGGER_AT: &str = "06:59:59.990";
/// Substring identifying a login page URL.
pub(crate) const LOGIN_MARKER: &str = "login";
/// Concurrent pipelines per firing.
pub(crate) const MAX_CONCURRENCY: usize = 8;
/// Upper bound accepted for the concurrency limit.
pub(crate) const MAX_CONCURRENCY_LIMIT: usize = 1024;
/// Wake-ups later than this are treated as missed.
pub(crate) const MAX_LATENESS: Duration = Duration::from_secs(1);
/// Form page retrieval timeout.
pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Submission timeout.
pub(crate) const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Total fetch attempts on retryable failures.
pub(crate) const FETCH_ATTEMPTS: u32 = 3;
/// Linear backoff step between fetch attempts.
pub(crate) const FETCH_BACKOFF: Duration = Duration::from_millis(200);
/// Bound on retained response excerpts.
pub(crate) const EXCERPT_LIMIT: usize = 512;
/// Bound on the size of a fetched form page.
pub(crate) const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;
/// Profile file consulted when no inline profiles are supplied.
pub(crate) const PROFILES_PATH: &str = "users.json";
/// Sleep coarsely until this far from the target.
pub(crate) const COARSE_MARGIN: Duration = Duration::from_secs(2);
/// Spin (yielding) inside this window before the target.
pub(crate) const SPIN_WINDOW: Duration = Duration::from_millis(15);
/// Longest single coarse sleep, so wall-clock adjustments are noticed.
pub(crate) const MAX_COARSE_SLEEP: Duration = Duration::from_secs(60);
