//! Work items handed from the status tracker to the dispatcher.

use std::time::Duration;

use crate::completion::Completion;

/// Upload work item.
#[derive(Debug)]
pub struct AddOperation {
    /// Local path to add.
    pub file_path: String,
    /// Settled with the content identifier.
    pub completion: Completion,
}

/// Fetch or export work item.
#[derive(Debug)]
pub struct GetOperation {
    /// Content identifier to materialize.
    pub content_id: String,
    /// Caller-supplied output path prefix.
    pub output_path: String,
    /// Stream a CAR export instead of unpacking the content.
    pub export_archive: bool,
    /// Store client timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// Settled with the path the content was written to.
    pub completion: Completion,
}

/// Operation accepted by the dispatcher queue.
#[derive(Debug)]
pub enum StoreOperation {
    /// Add a local file or directory.
    Add(AddOperation),
    /// Fetch or export stored content.
    Get(GetOperation),
}

impl StoreOperation {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Get(_) => "get",
        }
    }
}
