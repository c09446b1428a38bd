//! HTTP surface: routing, handlers and middleware.

pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod files;
pub(crate) mod health;
pub(crate) mod router;
pub(crate) mod telemetry;
