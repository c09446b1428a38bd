use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::StoreSession;
use crate::error::{IpfsError, IpfsResult};

/// Calls observed by [`StubSession`], shared with the test body.
#[derive(Debug, Default)]
pub(crate) struct StubLog {
    pub(crate) added: Vec<String>,
    pub(crate) fetched: Vec<(String, PathBuf)>,
    pub(crate) timeouts: Vec<Option<Duration>>,
    /// Timeout in force when each add or fetch ran.
    pub(crate) effective_timeouts: Vec<Option<Duration>>,
}

#[derive(Debug)]
pub(crate) struct StubSession {
    log: Arc<Mutex<StubLog>>,
    timeout: Option<Duration>,
    content_id: String,
    fail_add: bool,
    fail_fetch: bool,
}

impl StubSession {
    pub(crate) fn new(content_id: &str) -> (Self, Arc<Mutex<StubLog>>) {
        let log = Arc::new(Mutex::new(StubLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                timeout: None,
                content_id: content_id.to_string(),
                fail_add: false,
                fail_fetch: false,
            },
            log,
        )
    }

    pub(crate) const fn failing_add(mut self) -> Self {
        self.fail_add = true;
        self
    }

    pub(crate) const fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    fn with_log(&self, record: impl FnOnce(&mut StubLog)) {
        let mut log = self.log.lock().expect("stub log poisoned");
        record(&mut log);
    }
}

#[async_trait]
impl StoreSession for StubSession {
    async fn add_directory(&mut self, path: &str) -> IpfsResult<String> {
        let timeout = self.timeout;
        self.with_log(|log| {
            log.added.push(path.to_string());
            log.effective_timeouts.push(timeout);
        });
        if self.fail_add {
            return Err(IpfsError::MissingHash {
                path: PathBuf::from(path),
            });
        }
        Ok(self.content_id.clone())
    }

    async fn fetch(&mut self, content_id: &str, local_path: &Path) -> IpfsResult<()> {
        let timeout = self.timeout;
        self.with_log(|log| {
            log.fetched
                .push((content_id.to_string(), local_path.to_path_buf()));
            log.effective_timeouts.push(timeout);
        });
        if self.fail_fetch {
            return Err(IpfsError::HttpStatus {
                operation: "get",
                url: format!("stub://get?arg={content_id}"),
                status: 500,
                body: "merkledag: not found".to_string(),
            });
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.with_log(|log| log.timeouts.push(timeout));
    }
}
