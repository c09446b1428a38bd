//! Wire DTOs for the Cairn HTTP API.
//!
//! Conversions into the store-agnostic request types live here so the JSON
//! contract and its mapping onto the workflow stay in one place.

use std::time::Duration;

use cairn_core::{
    AddFileRequest, AddFileResult, CacheRootHashRequest, GetFileRequest, GetFileResult,
    OperationError, PollStatus, Progress, RootHash,
};
use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document surfaced on errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of `POST /v1/files/add`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddFileBody {
    /// Local file or directory to upload.
    pub file_path: String,
}

impl From<AddFileBody> for AddFileRequest {
    fn from(body: AddFileBody) -> Self {
        Self {
            file_path: body.file_path,
        }
    }
}

/// Body of `POST /v1/files/get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetFileBody {
    /// Content identifier to fetch.
    pub content_id: String,
    /// Output path prefix; the content digest is appended.
    pub output_path: String,
    /// Export a CAR archive instead of unpacking the content.
    #[serde(default)]
    pub export_archive: bool,
    /// Store timeout in seconds; `0` disables it.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Merkle tree size as a power of two; `0` skips hashing.
    #[serde(default)]
    pub tree_log2_size: u32,
}

impl From<GetFileBody> for GetFileRequest {
    fn from(body: GetFileBody) -> Self {
        Self {
            content_id: body.content_id,
            output_path: body.output_path,
            export_archive: body.export_archive,
            timeout: (body.timeout_secs > 0).then(|| Duration::from_secs(body.timeout_secs)),
            tree_log2_size: body.tree_log2_size,
        }
    }
}

/// Body of `POST /v1/root-hashes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRootHashBody {
    /// Path the hash is cached under.
    pub content_id: String,
    /// Merkle tree size as a power of two.
    pub tree_log2_size: u32,
    /// Hex-encoded 32-byte hash.
    pub root_hash: String,
}

impl TryFrom<CacheRootHashBody> for CacheRootHashRequest {
    type Error = OperationError;

    fn try_from(body: CacheRootHashBody) -> Result<Self, Self::Error> {
        Ok(Self {
            root_hash: RootHash::from_hex(&body.root_hash)?,
            path: body.content_id,
            tree_log2_size: body.tree_log2_size,
        })
    }
}

/// Progress of a running operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressView {
    /// Completion percentage; currently always `0`.
    pub progress: u32,
    /// Unix timestamp (seconds) of the observation.
    pub updated_at: i64,
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        Self {
            progress: progress.percent,
            updated_at: progress.updated_at.timestamp(),
        }
    }
}

/// Either progress or the final result, tagged by field name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollResponse<T> {
    /// The operation is still running.
    Progress(ProgressView),
    /// The operation finished.
    Result(T),
}

impl<T, U> From<PollStatus<U>> for PollResponse<T>
where
    T: From<U>,
{
    fn from(status: PollStatus<U>) -> Self {
        match status {
            PollStatus::Progress(progress) => Self::Progress(progress.into()),
            PollStatus::Ready(result) => Self::Result(result.into()),
        }
    }
}

/// Result of a finished add.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddFileResultView {
    /// Root content identifier of the upload.
    pub content_id: String,
}

impl From<AddFileResult> for AddFileResultView {
    fn from(result: AddFileResult) -> Self {
        Self {
            content_id: result.content_id,
        }
    }
}

/// Result of a finished get.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetFileResultView {
    /// Path the content was written to.
    pub output_path: String,
    /// Hex-encoded merkle root hash.
    pub root_hash: String,
}

impl From<GetFileResult> for GetFileResultView {
    fn from(result: GetFileResult) -> Self {
        Self {
            output_path: result.output_path,
            root_hash: result.root_hash.to_hex(),
        }
    }
}
