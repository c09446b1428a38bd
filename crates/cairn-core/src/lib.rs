#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Store-agnostic operation model, error taxonomy and service traits.

mod completion;
mod error;
mod model;
mod operation;
mod service;

pub use completion::{CellState, Completion, CompletionCell, OperationOutcome, completion_cell};
pub use error::{BoxedSource, OperationError};
pub use model::{
    AddFileRequest, AddFileResult, CacheRootHashRequest, GetFileRequest, GetFileResult,
    PollStatus, Progress, ROOT_HASH_LEN, RequestKey, RootHash,
};
pub use operation::{AddOperation, GetOperation, StoreOperation};
pub use service::{FileWorkflow, OperationQueue, RootHasher};
