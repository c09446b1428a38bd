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
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! Cairn application bootstrap wiring.
//!
//! Layout: `config.rs` (flags and environment), `bootstrap.rs` (service wiring).

/// Application bootstrap.
pub mod bootstrap;
/// Command-line and environment configuration.
pub mod config;
mod error;

pub use bootstrap::run_app;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
