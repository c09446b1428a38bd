//! Error types for logging setup and metrics exposition.

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while wiring logging or rendering metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log level is not a valid filter directive.
    #[error("invalid log filter")]
    LogFilter {
        /// Directive string that failed to parse.
        directive: String,
        /// Underlying directive parse error.
        source: ParseError,
    },
    /// A global tracing subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
    /// A collector could not be built or registered.
    #[error("failed to set up metric")]
    Metric {
        /// Metric name tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Gathering the registry into text exposition format failed.
    #[error("failed to encode metrics")]
    Encode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoded exposition text was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    EncodeUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}
