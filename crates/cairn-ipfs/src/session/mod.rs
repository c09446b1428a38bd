//! Store session abstraction driven exclusively by the dispatcher task.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::IpfsResult;

mod kubo;
#[cfg(test)]
mod stub;

pub use kubo::KuboSession;
#[cfg(test)]
pub(crate) use stub::StubSession;

/// Primitive operations of the content-store client.
///
/// Methods take `&mut self`: the dispatcher owns the session, so timeout
/// changes never race with in-flight requests.
#[async_trait]
pub trait StoreSession: Send {
    /// Upload a file or directory tree and return the root content identifier.
    async fn add_directory(&mut self, path: &str) -> IpfsResult<String>;

    /// Materialize `content_id` at `local_path`.
    async fn fetch(&mut self, content_id: &str, local_path: &Path) -> IpfsResult<()>;

    /// Timeout applied to subsequent requests; `None` disables it.
    fn set_timeout(&mut self, timeout: Option<Duration>);
}
