//! Memoized merkle root hashes and the external tool that computes them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cairn_core::{OperationError, ROOT_HASH_LEN, RootHash, RootHasher};
use tokio::process::Command;
use tracing::{debug, info};

/// Default location of the merkle tree hash executable.
pub const DEFAULT_MERKLE_TREE_HASH: &str = "/opt/cartesi/bin/merkle-tree-hash";
/// Page size passed to the tool, as a power of two.
pub const PAGE_LOG2_SIZE: u32 = 3;
/// Smallest tree size the tool accepts; `0` is reserved for "no hash".
pub const MIN_TREE_LOG2_SIZE: u32 = 3;

/// Where a resolved root hash came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootHashSource {
    /// `tree_log2_size` was zero.
    Zero,
    /// Served from the cache.
    Cached,
    /// Computed by the hasher and inserted.
    Computed,
}

impl RootHashSource {
    /// Label used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Cached => "hit",
            Self::Computed => "computed",
        }
    }
}

/// Unbounded `(path, tree_log2_size) -> RootHash` cache in front of a [`RootHasher`].
///
/// Entries are never invalidated. Concurrent misses for the same key may each
/// run the hasher; the last insert wins and all values are expected to agree.
pub struct RootHashCache {
    entries: Mutex<HashMap<(String, u32), RootHash>>,
    hasher: Arc<dyn RootHasher>,
}

impl RootHashCache {
    /// Create an empty cache backed by `hasher`.
    #[must_use]
    pub fn new(hasher: Arc<dyn RootHasher>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hasher,
        }
    }

    /// Cached hash for `(path, tree_log2_size)`.
    #[must_use]
    pub fn get(&self, path: &str, tree_log2_size: u32) -> Option<RootHash> {
        self.lock()
            .get(&(path.to_string(), tree_log2_size))
            .copied()
    }

    /// Insert or overwrite the hash for `(path, tree_log2_size)` without verification.
    pub fn put(&self, path: impl Into<String>, tree_log2_size: u32, hash: RootHash) {
        self.lock().insert((path.into(), tree_log2_size), hash);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the hash for `(path, tree_log2_size)`, computing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidArgument`] for sizes 1 and 2, and
    /// whatever the hasher reports on a miss. Failures are not cached.
    pub async fn compute_or_get(
        &self,
        path: &str,
        tree_log2_size: u32,
    ) -> Result<(RootHash, RootHashSource), OperationError> {
        if tree_log2_size == 0 {
            return Ok((RootHash::ZERO, RootHashSource::Zero));
        }
        if tree_log2_size < MIN_TREE_LOG2_SIZE {
            return Err(OperationError::invalid_argument(
                "tree_log2_size",
                "must_be_zero_or_at_least_3",
                Some(tree_log2_size.to_string()),
            ));
        }
        if let Some(hash) = self.get(path, tree_log2_size) {
            debug!(path, tree_log2_size, "root hash served from cache");
            return Ok((hash, RootHashSource::Cached));
        }

        info!(path, tree_log2_size, "computing root hash");
        let hash = self.hasher.compute(path, tree_log2_size).await?;
        self.put(path, tree_log2_size, hash);
        Ok((hash, RootHashSource::Computed))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, u32), RootHash>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`RootHasher`] running the `merkle-tree-hash` executable.
#[derive(Debug, Clone)]
pub struct MerkleTreeHashTool {
    program: PathBuf,
}

impl MerkleTreeHashTool {
    /// Use the executable at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn failure(&self, exit_code: Option<i32>, output: String) -> OperationError {
        OperationError::ExternalTool {
            tool: self.program.clone(),
            exit_code,
            output,
            source: None,
        }
    }
}

impl Default for MerkleTreeHashTool {
    fn default() -> Self {
        Self::new(DEFAULT_MERKLE_TREE_HASH)
    }
}

#[async_trait]
impl RootHasher for MerkleTreeHashTool {
    async fn compute(&self, path: &str, tree_log2_size: u32) -> Result<RootHash, OperationError> {
        let output = Command::new(&self.program)
            .arg(format!("--page-log2-size={PAGE_LOG2_SIZE}"))
            .arg(format!("--tree-log2-size={tree_log2_size}"))
            .arg(format!("--input={path}"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| OperationError::ExternalTool {
                tool: self.program.clone(),
                exit_code: None,
                output: String::new(),
                source: Some(Box::new(err)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let combined = format!("{stdout}{stderr}").trim().to_string();
            return Err(self.failure(output.status.code(), combined));
        }

        let trimmed = stdout.trim();
        if trimmed.len() != ROOT_HASH_LEN * 2 {
            return Err(self.failure(output.status.code(), trimmed.to_string()));
        }
        let bytes = hex::decode(trimmed).map_err(|err| OperationError::ExternalTool {
            tool: self.program.clone(),
            exit_code: output.status.code(),
            output: trimmed.to_string(),
            source: Some(Box::new(err)),
        })?;
        RootHash::from_slice(&bytes)
    }
}
