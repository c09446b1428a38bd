//! # Design
//!
//! - Errors raised while talking to the Kubo RPC API or touching local files.
//! - Each variant names the operation; messages carry the minimum context
//!   (operation, status) needed once they are flattened into a poll response.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for store adapter operations.
pub type IpfsResult<T> = Result<T, IpfsError>;

/// Failures raised by the Kubo session and the archive exporter.
#[derive(Debug, Error)]
pub enum IpfsError {
    /// The configured gateway address could not form an API URL.
    #[error("invalid gateway address")]
    InvalidGateway {
        /// Address supplied by configuration.
        gateway: String,
        /// Underlying URL parse error.
        source: url::ParseError,
    },
    /// Building the HTTP client failed.
    #[error("failed to build http client")]
    Client {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// Sending a request or reading its body failed.
    #[error("{operation} request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The API answered with a non-success status.
    #[error("{operation} returned status {status}: {body}")]
    HttpStatus {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, usually a Kubo error document.
        body: String,
    },
    /// Local filesystem access failed.
    #[error("{operation} io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walking a directory for upload failed.
    #[error("failed to walk upload directory")]
    Walk {
        /// Root being walked.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// A response line could not be decoded.
    #[error("{operation} response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// The add response finished without reporting a root hash.
    #[error("add response did not include a content identifier")]
    MissingHash {
        /// Path that was uploaded.
        path: PathBuf,
    },
    /// A fetched archive entry would land outside the output path.
    #[error("archive entry escapes the output path")]
    UnsafeEntry {
        /// Offending entry path.
        entry: PathBuf,
    },
    /// A blocking helper task panicked or was cancelled.
    #[error("{operation} task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl IpfsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn http(operation: &'static str, url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            operation,
            url: url.to_string(),
            source,
        }
    }
}
