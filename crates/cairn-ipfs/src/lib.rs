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

//! Single-consumer dispatcher serializing work against the Kubo content store.

mod error;
mod export;
/// Store session abstraction and the Kubo implementation.
pub mod session;
mod worker;

pub use error::{IpfsError, IpfsResult};
pub use export::{ArchiveExporter, DagExporter};
pub use session::{KuboSession, StoreSession};
pub use worker::safe_output_path;

use std::sync::Arc;

use cairn_core::{OperationQueue, StoreOperation};
use reqwest::{Response, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Capacity of the dispatcher queue.
pub const OPERATION_BUFFER: usize = 128;

/// Handle to the dispatcher task; cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct IpfsDispatcher {
    operations: mpsc::Sender<StoreOperation>,
}

impl IpfsDispatcher {
    /// Start the dispatcher task owning `session`.
    ///
    /// The task exits once every handle has been dropped and the queue drained.
    #[must_use]
    pub fn spawn(
        session: Box<dyn StoreSession>,
        exporter: Arc<dyn DagExporter>,
    ) -> (Self, JoinHandle<()>) {
        let (operations, receiver) = mpsc::channel(OPERATION_BUFFER);
        let handle = worker::spawn(receiver, session, exporter);
        (Self { operations }, handle)
    }

    /// Start a dispatcher talking to the Kubo API at `gateway`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway address is invalid or an HTTP client
    /// cannot be built.
    pub fn connect(gateway: &str) -> IpfsResult<(Self, JoinHandle<()>)> {
        let session = KuboSession::new(gateway)?;
        let exporter = ArchiveExporter::new(gateway)?;
        Ok(Self::spawn(Box::new(session), Arc::new(exporter)))
    }
}

impl OperationQueue for IpfsDispatcher {
    fn submit(&self, operation: StoreOperation) {
        let operations = self.operations.clone();
        tokio::spawn(async move {
            let kind = operation.kind();
            if operations.send(operation).await.is_err() {
                warn!(kind, "operation queue closed; dropping work item");
            }
        });
    }
}

/// Base URL of the `/api/v0/` RPC namespace for `gateway`.
pub(crate) fn api_base_url(gateway: &str) -> IpfsResult<Url> {
    let trimmed = gateway.trim().trim_end_matches('/');
    let raw = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        format!("{trimmed}/api/v0/")
    } else {
        format!("http://{trimmed}/api/v0/")
    };
    Url::parse(&raw).map_err(|source| IpfsError::InvalidGateway {
        gateway: gateway.to_string(),
        source,
    })
}

/// Turn a non-success response into [`IpfsError::HttpStatus`] with its body.
pub(crate) async fn ensure_success(
    operation: &'static str,
    url: &Url,
    response: Response,
) -> IpfsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IpfsError::HttpStatus {
        operation,
        url: url.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StubSession;
    use anyhow::Result;
    use async_trait::async_trait;
    use cairn_core::{
        AddOperation, CellState, CompletionCell, GetOperation, OperationError, OperationOutcome,
        completion_cell,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingExporter {
        calls: Mutex<Vec<(String, PathBuf)>>,
        fail: bool,
    }

    #[async_trait]
    impl DagExporter for RecordingExporter {
        async fn export(&self, content_id: &str, output_path: &Path) -> IpfsResult<()> {
            self.calls
                .lock()
                .expect("exporter log poisoned")
                .push((content_id.to_string(), output_path.to_path_buf()));
            if self.fail {
                return Err(IpfsError::io(
                    "export.write",
                    output_path,
                    std::io::Error::other("disk full"),
                ));
            }
            Ok(())
        }
    }

    async fn settle(mut cell: CompletionCell) -> Option<OperationOutcome> {
        for _ in 0..400 {
            match cell.try_take() {
                CellState::Settled(outcome) => return Some(outcome),
                CellState::Abandoned => return None,
                CellState::Empty => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
        panic!("operation did not settle");
    }

    fn add(path: &str) -> (StoreOperation, CompletionCell) {
        let (completion, cell) = completion_cell();
        (
            StoreOperation::Add(AddOperation {
                file_path: path.to_string(),
                completion,
            }),
            cell,
        )
    }

    fn get(
        content_id: &str,
        output_path: &str,
        export_archive: bool,
        timeout: Option<Duration>,
    ) -> (StoreOperation, CompletionCell) {
        let (completion, cell) = completion_cell();
        (
            StoreOperation::Get(GetOperation {
                content_id: content_id.to_string(),
                output_path: output_path.to_string(),
                export_archive,
                timeout,
                completion,
            }),
            cell,
        )
    }

    #[test]
    fn safe_output_path_appends_content_digest() {
        assert_eq!(
            safe_output_path("/data/out", "abc"),
            PathBuf::from(
                "/data/out_ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            )
        );
    }

    #[test]
    fn api_base_url_accepts_host_port_and_urls() -> Result<()> {
        assert_eq!(
            api_base_url("localhost:5001")?.as_str(),
            "http://localhost:5001/api/v0/"
        );
        assert_eq!(
            api_base_url("https://ipfs.internal:5001/")?.join("dag/export")?.as_str(),
            "https://ipfs.internal:5001/api/v0/dag/export"
        );
        assert!(matches!(
            api_base_url("bad host:port"),
            Err(IpfsError::InvalidGateway { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn add_clears_timeout_and_returns_content_id() {
        let (session, log) = StubSession::new("QmAdded");
        let (dispatcher, _handle) =
            IpfsDispatcher::spawn(Box::new(session), Arc::new(RecordingExporter::default()));

        let (operation, cell) = add("/data/x");
        dispatcher.submit(operation);

        match settle(cell).await {
            Some(Ok(content_id)) => assert_eq!(content_id, "QmAdded"),
            other => panic!("unexpected outcome {other:?}"),
        }
        let log = log.lock().expect("stub log poisoned");
        assert_eq!(log.added, vec!["/data/x".to_string()]);
        assert_eq!(log.timeouts, vec![None]);
    }

    #[tokio::test]
    async fn get_fetches_into_safe_path_with_timeout() {
        let (session, log) = StubSession::new("unused");
        let exporter = Arc::new(RecordingExporter::default());
        let (dispatcher, _handle) = IpfsDispatcher::spawn(Box::new(session), exporter.clone());

        let (operation, cell) = get("abc", "/out/file", false, Some(Duration::from_secs(7)));
        dispatcher.submit(operation);

        let expected = safe_output_path("/out/file", "abc");
        match settle(cell).await {
            Some(Ok(path)) => assert_eq!(PathBuf::from(path), expected),
            other => panic!("unexpected outcome {other:?}"),
        }
        let log = log.lock().expect("stub log poisoned");
        assert_eq!(log.fetched, vec![("abc".to_string(), expected)]);
        assert_eq!(log.effective_timeouts, vec![Some(Duration::from_secs(7))]);
        assert!(exporter.calls.lock().expect("exporter log poisoned").is_empty());
    }

    #[tokio::test]
    async fn export_archive_uses_exporter_not_fetch() {
        let (session, log) = StubSession::new("unused");
        let exporter = Arc::new(RecordingExporter::default());
        let (dispatcher, _handle) = IpfsDispatcher::spawn(Box::new(session), exporter.clone());

        let (operation, cell) = get("bafycar", "/out/archive", true, None);
        dispatcher.submit(operation);

        let expected = safe_output_path("/out/archive", "bafycar");
        assert!(matches!(settle(cell).await, Some(Ok(_))));
        assert_eq!(
            *exporter.calls.lock().expect("exporter log poisoned"),
            vec![("bafycar".to_string(), expected)]
        );
        assert!(log.lock().expect("stub log poisoned").fetched.is_empty());
    }

    #[tokio::test]
    async fn failures_are_wrapped_by_operation() {
        let (session, _log) = StubSession::new("unused");
        let session = session.failing_add().failing_fetch();
        let exporter = Arc::new(RecordingExporter {
            fail: true,
            ..RecordingExporter::default()
        });
        let (dispatcher, _handle) = IpfsDispatcher::spawn(Box::new(session), exporter);

        let (add_op, add_cell) = add("/data/broken");
        let (fetch_op, fetch_cell) = get("bafyfetch", "/out/a", false, None);
        let (export_op, export_cell) = get("bafyexport", "/out/b", true, None);
        dispatcher.submit(add_op);
        dispatcher.submit(fetch_op);
        dispatcher.submit(export_op);

        match settle(add_cell).await {
            Some(Err(OperationError::ExternalStore {
                operation, target, ..
            })) => {
                assert_eq!(operation, "add");
                assert_eq!(target, "/data/broken");
            }
            other => panic!("unexpected add outcome {other:?}"),
        }
        match settle(fetch_cell).await {
            Some(Err(err @ OperationError::ExternalStore { .. })) => {
                assert!(err.detail().contains("merkledag: not found"));
            }
            other => panic!("unexpected fetch outcome {other:?}"),
        }
        assert!(matches!(
            settle(export_cell).await,
            Some(Err(OperationError::Export { .. }))
        ));
    }

    #[tokio::test]
    async fn operations_run_in_submission_order() {
        let (session, log) = StubSession::new("QmAny");
        let (dispatcher, _handle) =
            IpfsDispatcher::spawn(Box::new(session), Arc::new(RecordingExporter::default()));

        let mut cells = Vec::new();
        for index in 0..5 {
            let (operation, cell) = add(&format!("/data/{index}"));
            dispatcher.operations.send(operation).await.expect("queue open");
            cells.push(cell);
        }
        for cell in cells {
            assert!(matches!(settle(cell).await, Some(Ok(_))));
        }
        let added = log.lock().expect("stub log poisoned").added.clone();
        assert_eq!(
            added,
            (0..5).map(|index| format!("/data/{index}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn closed_queue_abandons_completion() {
        let (operations, receiver) = mpsc::channel(1);
        drop(receiver);
        let dispatcher = IpfsDispatcher { operations };

        let (operation, cell) = add("/data/x");
        dispatcher.submit(operation);
        assert!(settle(cell).await.is_none());
    }

    #[tokio::test]
    async fn dispatcher_exits_when_handles_drop() -> Result<()> {
        let (session, _log) = StubSession::new("QmAny");
        let (dispatcher, handle) =
            IpfsDispatcher::spawn(Box::new(session), Arc::new(RecordingExporter::default()));
        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(1), handle).await??;
        Ok(())
    }
}
