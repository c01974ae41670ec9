//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; parsing lives in `validate.rs` and `loader.rs`.
//! - Durations and URLs are stored already parsed so consumers never re-validate.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use gatepass_core::FieldMap;
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Portal endpoints and form-level field policy.
    pub endpoints: EndpointConfig,
    /// Daily trigger and firing limits.
    pub schedule: ScheduleConfig,
    /// Timeouts, retry, and size bounds for HTTP exchanges.
    pub http: HttpConfig,
    /// Where profiles are loaded from at each firing.
    pub profiles: ProfileSourceConfig,
    /// Optional JSON-lines file receiving every outcome.
    pub outcome_log: Option<PathBuf>,
}

/// Portal endpoints plus fields every submission depends on.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Page hosting the form; also the Referer of each submission.
    pub form_url: Url,
    /// Endpoint receiving the submission.
    pub submit_url: Url,
    /// Substring of the target form's `action`, when the page hosts several forms.
    pub form_action: Option<String>,
    /// URL path substrings identifying the portal's login page.
    pub login_markers: Vec<String>,
    /// Fields that must be non-blank for every user.
    pub critical_fields: Vec<String>,
    /// Values used for fields the live page does not carry.
    pub field_defaults: FieldMap,
}

impl EndpointConfig {
    /// Whether the path of `url` looks like the portal's login page.
    ///
    /// Host and query are ignored, so `/done?from=login` is not a login page.
    #[must_use]
    pub fn is_login_url(&self, url: &Url) -> bool {
        let lowered = url.path().to_ascii_lowercase();
        self.login_markers
            .iter()
            .any(|marker| lowered.contains(&marker.to_ascii_lowercase()))
    }
}

/// Daily trigger definition and firing limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Timezone the trigger is interpreted in.
    pub timezone: Tz,
    /// Local wall-clock trigger instant.
    pub trigger: TriggerTime,
    /// Maximum concurrently running pipelines in one firing.
    pub max_concurrency: usize,
    /// Wake-ups later than this skip the firing.
    pub max_lateness: Duration,
    /// Precision wait tuning.
    pub wait: WaitTuning,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::Asia__Kolkata,
            trigger: TriggerTime::new(6, 59, 59, 990),
            max_concurrency: defaults::MAX_CONCURRENCY,
            max_lateness: defaults::MAX_LATENESS,
            wait: WaitTuning::default(),
        }
    }
}

/// Phases of the precision wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTuning {
    /// Coarse sleeping stops this far before the target.
    pub coarse_margin: Duration,
    /// Inside this window the waiter yields instead of sleeping.
    pub spin_window: Duration,
    /// Upper bound on any single coarse sleep.
    pub max_coarse_sleep: Duration,
}

impl Default for WaitTuning {
    fn default() -> Self {
        Self {
            coarse_margin: defaults::COARSE_MARGIN,
            spin_window: defaults::SPIN_WINDOW,
            max_coarse_sleep: defaults::MAX_COARSE_SLEEP,
        }
    }
}

/// Timeouts, retries, and size bounds for portal traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Form page retrieval timeout.
    pub fetch_timeout: Duration,
    /// Submission timeout.
    pub submit_timeout: Duration,
    /// Total fetch attempts on retryable failures (at least one).
    pub fetch_attempts: u32,
    /// Linear backoff step between fetch attempts.
    pub fetch_backoff: Duration,
    /// Maximum characters kept from a response body.
    pub excerpt_limit: usize,
    /// Maximum accepted size of a form page.
    pub max_page_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: defaults::FETCH_TIMEOUT,
            submit_timeout: defaults::SUBMIT_TIMEOUT,
            fetch_attempts: defaults::FETCH_ATTEMPTS,
            fetch_backoff: defaults::FETCH_BACKOFF,
            excerpt_limit: defaults::EXCERPT_LIMIT,
            max_page_bytes: defaults::MAX_PAGE_BYTES,
        }
    }
}

/// Location of the profile list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSourceConfig {
    /// JSON document on disk, re-read at each firing.
    File(PathBuf),
    /// JSON document supplied inline through the environment.
    Inline(String),
}

/// Local wall-clock time of day with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerTime {
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
}

impl TriggerTime {
    /// Trigger time from raw components. Out-of-range components surface from
    /// [`TriggerTime::to_naive_time`]; parse untrusted input through [`FromStr`].
    #[must_use]
    pub const fn new(hour: u32, minute: u32, second: u32, millis: u32) -> Self {
        Self {
            hour,
            minute,
            second,
            millis,
        }
    }

    /// The trigger as a naive local time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a component is out of range.
    pub fn to_naive_time(self) -> ConfigResult<NaiveTime> {
        NaiveTime::from_hms_milli_opt(self.hour, self.minute, self.second, self.millis).ok_or_else(
            || ConfigError::invalid("GATEPASS_TRIGGER_AT", self.to_string(), "out_of_range"),
        )
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hour, self.minute, self.second, self.millis
        )
    }
}

impl FromStr for TriggerTime {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        crate::validate::parse_trigger_time(value)
    }
}
