//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: cairn_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: cairn_telemetry::TelemetryError,
    },
    /// Content store client construction failed.
    #[error("content store setup failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source store adapter error.
        source: cairn_ipfs::IpfsError,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
}

impl AppError {
    pub(crate) const fn api_server(
        operation: &'static str,
        source: cairn_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: cairn_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn store(operation: &'static str, source: cairn_ipfs::IpfsError) -> Self {
        Self::Store { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn messages_are_constant_and_sources_preserved() {
        let invalid = AppError::InvalidConfig {
            field: "port",
            reason: "zero",
            value: Some("0".to_string()),
        };
        assert_eq!(invalid.to_string(), "invalid configuration");
        assert!(invalid.source().is_none());

        let api = AppError::api_server(
            "api_server.serve",
            cairn_api::ApiServerError::Serve {
                source: io::Error::other("listener closed"),
            },
        );
        assert_eq!(api.to_string(), "api server operation failed");
        assert!(api.source().is_some());
    }
}
