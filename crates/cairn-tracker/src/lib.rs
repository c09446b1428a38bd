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

//! Request deduplication, result delivery and root-hash memoization.

mod root_hash;
mod status;
mod workflow;

pub use root_hash::{
    DEFAULT_MERKLE_TREE_HASH, MIN_TREE_LOG2_SIZE, MerkleTreeHashTool, PAGE_LOG2_SIZE,
    RootHashCache, RootHashSource,
};
pub use status::{Observation, StatusTracker};
pub use workflow::FileCoordinator;
