//! # Design
//!
//! - One error type for every failure a tracked operation can deliver to a poller.
//! - Keep `Display` messages constant; context lives in structured fields.
//! - `detail` renders fields plus the source chain for callers that need the full text.

use std::error::Error;
use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed source error carried across the dispatcher boundary.
pub type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// Failures surfaced by tracked operations and root-hash resolution.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A caller-supplied parameter was rejected.
    #[error("invalid argument")]
    InvalidArgument {
        /// Parameter name.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The external hash executable exited unsuccessfully or printed garbage.
    #[error("external tool failed")]
    ExternalTool {
        /// Program that was executed.
        tool: PathBuf,
        /// Exit code when the process terminated normally.
        exit_code: Option<i32>,
        /// Captured output used for diagnosis.
        output: String,
        /// Spawn or decode failure, if any.
        #[source]
        source: Option<BoxedSource>,
    },
    /// The content-store client rejected an add or fetch.
    #[error("content store operation failed")]
    ExternalStore {
        /// Operation identifier.
        operation: &'static str,
        /// Content identifier or input path the operation targeted.
        target: String,
        /// Underlying client failure.
        #[source]
        source: BoxedSource,
    },
    /// Streaming a DAG export into an archive failed.
    #[error("archive export failed")]
    Export {
        /// Content identifier being exported.
        content_id: String,
        /// Archive path being written.
        path: PathBuf,
        /// Underlying filesystem or HTTP failure.
        #[source]
        source: BoxedSource,
    },
    /// The dispatcher dropped the work item without settling it.
    #[error("operation dispatcher unavailable")]
    DispatcherUnavailable,
}

impl OperationError {
    /// Construct an invalid-argument error.
    #[must_use]
    pub const fn invalid_argument(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidArgument {
            field,
            reason,
            value,
        }
    }

    /// Construct a content-store failure.
    pub fn store(
        operation: &'static str,
        target: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::ExternalStore {
            operation,
            target: target.into(),
            source: source.into(),
        }
    }

    /// Construct an archive export failure.
    pub fn export(
        content_id: impl Into<String>,
        path: impl Into<PathBuf>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Export {
            content_id: content_id.into(),
            path: path.into(),
            source: source.into(),
        }
    }

    /// Short, stable category label used for logs and metrics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::ExternalTool { .. } => "external_tool",
            Self::ExternalStore { .. } => "external_store",
            Self::Export { .. } => "export",
            Self::DispatcherUnavailable => "dispatcher_unavailable",
        }
    }

    /// Render the message, its context fields and the full source chain.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut rendered = self.to_string();
        match self {
            Self::InvalidArgument {
                field,
                reason,
                value,
            } => {
                let _ = write!(rendered, ": {field} {reason}");
                if let Some(value) = value {
                    let _ = write!(rendered, " (got {value})");
                }
            }
            Self::ExternalTool {
                tool,
                exit_code,
                output,
                ..
            } => {
                let _ = write!(rendered, ": {}", tool.display());
                if let Some(code) = exit_code {
                    let _ = write!(rendered, " exited with {code}");
                }
                if !output.is_empty() {
                    let _ = write!(rendered, ", output: {output}");
                }
            }
            Self::ExternalStore {
                operation, target, ..
            } => {
                let _ = write!(rendered, ": {operation} {target}");
            }
            Self::Export {
                content_id, path, ..
            } => {
                let _ = write!(rendered, ": {content_id} -> {}", path.display());
            }
            Self::DispatcherUnavailable => {}
        }

        let mut source = self.source();
        while let Some(err) = source {
            let _ = write!(rendered, ": {err}");
            source = err.source();
        }
        rendered
    }
}
