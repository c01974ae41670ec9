//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges that describe firings and their outcomes.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the scheduler and reporters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    firings_total: IntCounter,
    firings_skipped_total: IntCounterVec,
    outcomes_total: IntCounterVec,
    last_wake_lateness_us: IntGauge,
    last_firing_duration_ms: IntGauge,
    last_firing_users: IntGauge,
}

/// Snapshot of selected gauges and counters for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Firings that ran their pipelines.
    pub firings_total: u64,
    /// Lateness of the most recent wake-up, in microseconds.
    pub last_wake_lateness_us: i64,
    /// Wall time of the most recent firing, in milliseconds.
    pub last_firing_duration_ms: i64,
    /// Number of users in the most recent firing.
    pub last_firing_users: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let firings_total = IntCounter::with_opts(Opts::new(
            "gatepass_firings_total",
            "Scheduled or manual firings that ran",
        ))
        .map_err(collector("gatepass_firings_total"))?;
        let firings_skipped_total = IntCounterVec::new(
            Opts::new(
                "gatepass_firings_skipped_total",
                "Scheduled firings that did not run, by reason",
            ),
            &["reason"],
        )
        .map_err(collector("gatepass_firings_skipped_total"))?;
        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "gatepass_outcomes_total",
                "Per-user run outcomes by terminal status",
            ),
            &["status"],
        )
        .map_err(collector("gatepass_outcomes_total"))?;
        let last_wake_lateness_us = IntGauge::with_opts(Opts::new(
            "gatepass_last_wake_lateness_us",
            "Lateness of the most recent scheduled wake-up (microseconds)",
        ))
        .map_err(collector("gatepass_last_wake_lateness_us"))?;
        let last_firing_duration_ms = IntGauge::with_opts(Opts::new(
            "gatepass_last_firing_duration_ms",
            "Wall time of the most recent firing (ms)",
        ))
        .map_err(collector("gatepass_last_firing_duration_ms"))?;
        let last_firing_users = IntGauge::with_opts(Opts::new(
            "gatepass_last_firing_users",
            "Users processed by the most recent firing",
        ))
        .map_err(collector("gatepass_last_firing_users"))?;

        registry
            .register(Box::new(firings_total.clone()))
            .map_err(register("gatepass_firings_total"))?;
        registry
            .register(Box::new(firings_skipped_total.clone()))
            .map_err(register("gatepass_firings_skipped_total"))?;
        registry
            .register(Box::new(outcomes_total.clone()))
            .map_err(register("gatepass_outcomes_total"))?;
        registry
            .register(Box::new(last_wake_lateness_us.clone()))
            .map_err(register("gatepass_last_wake_lateness_us"))?;
        registry
            .register(Box::new(last_firing_duration_ms.clone()))
            .map_err(register("gatepass_last_firing_duration_ms"))?;
        registry
            .register(Box::new(last_firing_users.clone()))
            .map_err(register("gatepass_last_firing_users"))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                firings_total,
                firings_skipped_total,
                outcomes_total,
                last_wake_lateness_us,
                last_firing_duration_ms,
                last_firing_users,
            }),
        })
    }

    /// Increment the counter of firings that ran.
    pub fn inc_firing(&self) {
        self.inner.firings_total.inc();
    }

    /// Increment the skipped-firing counter for `reason`.
    pub fn inc_firing_skipped(&self, reason: &str) {
        self.inner
            .firings_skipped_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Increment the outcome counter for the given status label.
    pub fn inc_outcome(&self, status: &str) {
        self.inner.outcomes_total.with_label_values(&[status]).inc();
    }

    /// Current count of outcomes recorded with `status`.
    #[must_use]
    pub fn outcome_count(&self, status: &str) -> u64 {
        self.inner.outcomes_total.with_label_values(&[status]).get()
    }

    /// Current count of firings skipped for `reason`.
    #[must_use]
    pub fn skipped_count(&self, reason: &str) -> u64 {
        self.inner
            .firings_skipped_total
            .with_label_values(&[reason])
            .get()
    }

    /// Record how late the scheduler woke relative to its target.
    pub fn observe_wake_lateness(&self, lateness: Duration) {
        self.inner
            .last_wake_lateness_us
            .set(i64::try_from(lateness.as_micros()).unwrap_or(i64::MAX));
    }

    /// Record the wall time and size of a finished firing.
    pub fn observe_firing(&self, duration: Duration, users: usize) {
        self.inner
            .last_firing_duration_ms
            .set(Self::duration_to_ms(duration));
        self.inner
            .last_firing_users
            .set(i64::try_from(users).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            firings_total: self.inner.firings_total.get(),
            last_wake_lateness_us: self.inner.last_wake_lateness_us.get(),
            last_firing_duration_ms: self.inner.last_firing_duration_ms.get(),
            last_firing_users: self.inner.last_firing_users.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn collector(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn register(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsRegister { name, source }
}
