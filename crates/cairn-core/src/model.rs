//! Request, result and poll DTOs shared by the tracker and the API facade.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::OperationError;

/// Size in bytes of a merkle root hash.
pub const ROOT_HASH_LEN: usize = 32;

/// Deterministic identifier for one logical operation.
///
/// Two polls carrying the same key refer to the same operation and are
/// deduplicated by the status table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    /// Key for an add: the input file path itself.
    #[must_use]
    pub fn for_add(file_path: &str) -> Self {
        Self(file_path.to_string())
    }

    /// Key for a get: the content identifier joined to the output path.
    #[must_use]
    pub fn for_get(content_id: &str, output_path: &str) -> Self {
        Self(format!("{content_id}_{output_path}"))
    }
}

impl Display for RequestKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Raw 32-byte merkle root hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootHash([u8; ROOT_HASH_LEN]);

impl RootHash {
    /// The all-zero hash reported for a zero tree size.
    pub const ZERO: Self = Self([0; ROOT_HASH_LEN]);

    /// Wrap raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ROOT_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a hash from a byte slice that must be exactly 32 bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidArgument`] when the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OperationError> {
        let array: [u8; ROOT_HASH_LEN] = bytes.try_into().map_err(|_| {
            OperationError::invalid_argument(
                "root_hash",
                "must_be_32_bytes",
                Some(bytes.len().to_string()),
            )
        })?;
        Ok(Self::new(array))
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidArgument`] when the input is not valid
    /// hex or does not decode to 32 bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, OperationError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| {
            OperationError::invalid_argument("root_hash", "not_hex", Some(encoded.to_string()))
        })?;
        Self::from_slice(&bytes)
    }

    /// Lower-case hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Progress report returned while an operation is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Completion percentage. Always zero: the store client reports no progress.
    pub percent: u32,
    /// When the report was produced.
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Placeholder progress stamped with the current time.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            percent: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Result of one poll against a tracked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The operation is queued or running.
    Progress(Progress),
    /// The operation finished successfully.
    Ready(T),
}

/// Upload a local file or directory to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFileRequest {
    /// Local path to upload.
    pub file_path: String,
}

impl AddFileRequest {
    /// Deduplication key for this request.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::for_add(&self.file_path)
    }
}

/// Successful add outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFileResult {
    /// Content identifier assigned by the store.
    pub content_id: String,
}

/// Materialize stored content locally and report its merkle root hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileRequest {
    /// Content identifier to fetch.
    pub content_id: String,
    /// Caller-chosen output path prefix.
    pub output_path: String,
    /// Export the DAG as a CAR archive instead of unpacking the content.
    pub export_archive: bool,
    /// Store client timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// log2 of the merkle tree size used for the root hash.
    pub tree_log2_size: u32,
}

impl GetFileRequest {
    /// Deduplication key for this request.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::for_get(&self.content_id, &self.output_path)
    }
}

/// Successful get outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileResult {
    /// Path the content was written to.
    pub output_path: String,
    /// Merkle root hash of the materialized content.
    pub root_hash: RootHash,
}

/// Externally computed root hash pushed into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRootHashRequest {
    /// Path the hash was computed for.
    pub path: String,
    /// log2 tree size the hash was computed with.
    pub tree_log2_size: u32,
    /// The hash itself.
    pub root_hash: RootHash,
}
