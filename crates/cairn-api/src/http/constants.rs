//! Shared HTTP constants (headers, problem URIs).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_UNKNOWN: &str = "https://cairn.dev/problems/unknown";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://cairn.dev/problems/bad-request";
pub(crate) const PROBLEM_INTERNAL: &str = "https://cairn.dev/problems/internal";
