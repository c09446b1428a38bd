//! Seams between the facade, the tracker and the external collaborators.

use async_trait::async_trait;

use crate::error::OperationError;
use crate::model::{
    AddFileRequest, AddFileResult, CacheRootHashRequest, GetFileRequest, GetFileResult,
    PollStatus, RootHash,
};
use crate::operation::StoreOperation;

/// Queue feeding the single store dispatcher.
pub trait OperationQueue: Send + Sync {
    /// Hand an operation to the dispatcher without waiting for queue capacity.
    ///
    /// If the dispatcher is gone the operation is dropped, which the owning
    /// status record observes as an abandoned completion.
    fn submit(&self, operation: StoreOperation);
}

/// External merkle root hash computation.
#[async_trait]
pub trait RootHasher: Send + Sync {
    /// Compute the root hash of `path` for a tree of `2^tree_log2_size` bytes.
    async fn compute(&self, path: &str, tree_log2_size: u32) -> Result<RootHash, OperationError>;
}

/// Poll-based workflow façade consumed by the API layer.
#[async_trait]
pub trait FileWorkflow: Send + Sync {
    /// Start or poll an add.
    async fn add_file(
        &self,
        request: AddFileRequest,
    ) -> Result<PollStatus<AddFileResult>, OperationError>;

    /// Start or poll a get, resolving the root hash once the content is local.
    async fn get_file(
        &self,
        request: GetFileRequest,
    ) -> Result<PollStatus<GetFileResult>, OperationError>;

    /// Seed the root hash cache with an externally computed value.
    fn cache_root_hash(&self, request: CacheRootHashRequest);

    /// Number of request records currently tracked.
    fn tracked_requests(&self) -> usize;
}
