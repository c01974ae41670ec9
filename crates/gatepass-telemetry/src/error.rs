//! Error types for logging and metrics setup.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures raised while installing logging or maintaining the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed or could not be set.
    #[error("tracing subscriber installation failed")]
    SubscriberInstall {
        /// Subscriber initialisation error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A counter or gauge definition was rejected.
    #[error("metric definition rejected")]
    MetricsCollector {
        /// Metric that could not be built.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry refused a collector, usually a duplicate name.
    #[error("metric registration rejected")]
    MetricsRegister {
        /// Metric that could not be registered.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Text exposition of the registry failed.
    #[error("metrics rendering failed")]
    MetricsEncode {
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendered exposition text was not UTF-8.
    #[error("rendered metrics were not utf-8")]
    MetricsUtf8 {
        /// Conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}
