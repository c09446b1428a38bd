//! [`FileWorkflow`] implementation combining the status table, the dispatcher
//! queue and the root-hash cache.

use std::sync::Arc;

use async_trait::async_trait;
use cairn_core::{
    AddFileRequest, AddFileResult, AddOperation, CacheRootHashRequest, FileWorkflow,
    GetFileRequest, GetFileResult, GetOperation, OperationError, OperationQueue, PollStatus,
    Progress, RootHash, RootHasher, StoreOperation,
};
use cairn_telemetry::Metrics;
use tracing::{info, warn};

use crate::root_hash::RootHashCache;
use crate::status::{Observation, StatusTracker};

/// Poll-driven coordinator behind the API facade.
pub struct FileCoordinator {
    tracker: StatusTracker,
    root_hashes: RootHashCache,
    queue: Arc<dyn OperationQueue>,
    metrics: Metrics,
}

impl FileCoordinator {
    /// Build a coordinator submitting work to `queue` and hashing with `hasher`.
    #[must_use]
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        hasher: Arc<dyn RootHasher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            tracker: StatusTracker::new(),
            root_hashes: RootHashCache::new(hasher),
            queue,
            metrics,
        }
    }

    fn publish_tracked(&self) {
        self.metrics.set_tracked_requests(self.tracker.len());
    }

    async fn resolve_root_hash(
        &self,
        path: &str,
        tree_log2_size: u32,
    ) -> Result<RootHash, OperationError> {
        match self.root_hashes.compute_or_get(path, tree_log2_size).await {
            Ok((hash, source)) => {
                self.metrics.inc_root_hash_lookup(source.as_str());
                Ok(hash)
            }
            Err(err) => {
                self.metrics.inc_root_hash_lookup("failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl FileWorkflow for FileCoordinator {
    async fn add_file(
        &self,
        request: AddFileRequest,
    ) -> Result<PollStatus<AddFileResult>, OperationError> {
        let key = request.key();
        let observation = self.tracker.observe(&key, |completion| {
            self.queue.submit(StoreOperation::Add(AddOperation {
                file_path: request.file_path.clone(),
                completion,
            }));
        });
        self.publish_tracked();

        match observation {
            Observation::Started { generation } => {
                self.metrics.inc_operation_dispatched("add");
                info!(key = %key, generation, "add dispatched");
                Ok(PollStatus::Progress(Progress::placeholder()))
            }
            Observation::Pending { .. } => Ok(PollStatus::Progress(Progress::placeholder())),
            Observation::Settled {
                result,
                newly_settled,
                ..
            } => {
                if newly_settled {
                    self.metrics.inc_operation_settled("add", "success");
                }
                Ok(PollStatus::Ready(AddFileResult { content_id: result }))
            }
            Observation::Failed(err) => {
                self.metrics.inc_operation_settled("add", err.category());
                warn!(key = %key, error = %err.detail(), "add failed");
                Err(err)
            }
        }
    }

    async fn get_file(
        &self,
        request: GetFileRequest,
    ) -> Result<PollStatus<GetFileResult>, OperationError> {
        let key = request.key();
        let observation = self.tracker.observe(&key, |completion| {
            self.queue.submit(StoreOperation::Get(GetOperation {
                content_id: request.content_id.clone(),
                output_path: request.output_path.clone(),
                export_archive: request.export_archive,
                timeout: request.timeout,
                completion,
            }));
        });
        self.publish_tracked();

        match observation {
            Observation::Started { generation } => {
                self.metrics.inc_operation_dispatched("get");
                info!(
                    key = %key,
                    generation,
                    export_archive = request.export_archive,
                    "get dispatched"
                );
                Ok(PollStatus::Progress(Progress::placeholder()))
            }
            Observation::Pending { .. } => Ok(PollStatus::Progress(Progress::placeholder())),
            Observation::Settled {
                result,
                generation,
                newly_settled,
            } => {
                if newly_settled {
                    self.metrics.inc_operation_settled("get", "success");
                }
                match self
                    .resolve_root_hash(&result, request.tree_log2_size)
                    .await
                {
                    Ok(root_hash) => Ok(PollStatus::Ready(GetFileResult {
                        output_path: result,
                        root_hash,
                    })),
                    Err(err) => {
                        self.tracker.evict(&key, generation);
                        self.publish_tracked();
                        warn!(
                            key = %key,
                            generation,
                            path = %result,
                            error = %err.detail(),
                            "root hash resolution failed"
                        );
                        Err(err)
                    }
                }
            }
            Observation::Failed(err) => {
                self.metrics.inc_operation_settled("get", err.category());
                warn!(key = %key, error = %err.detail(), "get failed");
                Err(err)
            }
        }
    }

    fn cache_root_hash(&self, request: CacheRootHashRequest) {
        info!(
            path = %request.path,
            tree_log2_size = request.tree_log2_size,
            "root hash cached by caller"
        );
        self.root_hashes
            .put(request.path, request.tree_log2_size, request.root_hash);
    }

    fn tracked_requests(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{Completion, ROOT_HASH_LEN};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Queue that parks work items so tests settle them by hand.
    #[derive(Default)]
    struct ManualQueue {
        submitted: Mutex<Vec<StoreOperation>>,
    }

    impl ManualQueue {
        fn count(&self) -> usize {
            self.submitted.lock().expect("queue poisoned").len()
        }

        fn take(&self) -> StoreOperation {
            self.submitted.lock().expect("queue poisoned").remove(0)
        }

        fn take_completion(&self) -> Completion {
            match self.take() {
                StoreOperation::Add(add) => add.completion,
                StoreOperation::Get(get) => get.completion,
            }
        }
    }

    impl OperationQueue for ManualQueue {
        fn submit(&self, operation: StoreOperation) {
            self.submitted.lock().expect("queue poisoned").push(operation);
        }
    }

    struct FixedHasher {
        calls: AtomicUsize,
        result: Option<RootHash>,
    }

    #[async_trait]
    impl RootHasher for FixedHasher {
        async fn compute(&self, _path: &str, _log2: u32) -> Result<RootHash, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.ok_or_else(|| OperationError::ExternalTool {
                tool: PathBuf::from("merkle-tree-hash"),
                exit_code: Some(2),
                output: "input too large".to_string(),
                source: None,
            })
        }
    }

    struct Harness {
        queue: Arc<ManualQueue>,
        hasher: Arc<FixedHasher>,
        coordinator: FileCoordinator,
    }

    fn harness(hash: Option<RootHash>) -> Harness {
        let queue = Arc::new(ManualQueue::default());
        let hasher = Arc::new(FixedHasher {
            calls: AtomicUsize::new(0),
            result: hash,
        });
        let metrics = Metrics::new().expect("metrics");
        let coordinator = FileCoordinator::new(queue.clone(), hasher.clone(), metrics);
        Harness {
            queue,
            hasher,
            coordinator,
        }
    }

    fn add_request(path: &str) -> AddFileRequest {
        AddFileRequest {
            file_path: path.to_string(),
        }
    }

    fn get_request(content_id: &str, output_path: &str, log2: u32) -> GetFileRequest {
        GetFileRequest {
            content_id: content_id.to_string(),
            output_path: output_path.to_string(),
            export_archive: false,
            timeout: Some(Duration::from_secs(30)),
            tree_log2_size: log2,
        }
    }

    #[tokio::test]
    async fn add_polls_progress_until_result_then_caches_it() {
        let h = harness(None);

        let first = h.coordinator.add_file(add_request("/data/x")).await.expect("first");
        match first {
            PollStatus::Progress(progress) => assert_eq!(progress.percent, 0),
            PollStatus::Ready(_) => panic!("first poll must report progress"),
        }
        assert_eq!(h.queue.count(), 1);

        let pending = h.coordinator.add_file(add_request("/data/x")).await.expect("pending");
        assert!(matches!(pending, PollStatus::Progress(_)));
        assert_eq!(h.queue.count(), 1, "duplicate polls must not resubmit");

        match h.queue.take() {
            StoreOperation::Add(add) => {
                assert_eq!(add.file_path, "/data/x");
                assert!(add.completion.succeed("QmX"));
            }
            StoreOperation::Get(_) => panic!("expected add"),
        }

        for _ in 0..3 {
            let ready = h.coordinator.add_file(add_request("/data/x")).await.expect("ready");
            assert_eq!(
                ready,
                PollStatus::Ready(AddFileResult {
                    content_id: "QmX".to_string()
                })
            );
        }
        assert_eq!(h.queue.count(), 0);
        assert_eq!(h.coordinator.tracked_requests(), 1);
    }

    #[tokio::test]
    async fn failed_add_is_reported_once_and_retryable() {
        let h = harness(None);
        h.coordinator.add_file(add_request("/data/x")).await.expect("start");
        h.queue.take_completion().fail(OperationError::store(
            "add",
            "/data/x",
            std::io::Error::other("connection refused"),
        ));

        let err = h
            .coordinator
            .add_file(add_request("/data/x"))
            .await
            .expect_err("failure surfaces");
        assert!(err.detail().contains("connection refused"));
        assert_eq!(h.coordinator.tracked_requests(), 0);

        let retry = h.coordinator.add_file(add_request("/data/x")).await.expect("retry");
        assert!(matches!(retry, PollStatus::Progress(_)));
        assert_eq!(h.queue.count(), 1, "retry must dispatch a new operation");
    }

    #[tokio::test]
    async fn abandoned_operation_reports_dispatcher_unavailable() {
        let h = harness(None);
        h.coordinator.add_file(add_request("/data/x")).await.expect("start");
        drop(h.queue.take());

        assert!(matches!(
            h.coordinator.add_file(add_request("/data/x")).await,
            Err(OperationError::DispatcherUnavailable)
        ));
    }

    #[tokio::test]
    async fn distinct_keys_progress_independently() {
        let h = harness(None);
        h.coordinator.add_file(add_request("/data/a")).await.expect("a");
        h.coordinator.add_file(add_request("/data/b")).await.expect("b");
        assert_eq!(h.queue.count(), 2);

        h.queue.take_completion().succeed("QmA");
        assert!(matches!(
            h.coordinator.add_file(add_request("/data/a")).await,
            Ok(PollStatus::Ready(_))
        ));
        assert!(matches!(
            h.coordinator.add_file(add_request("/data/b")).await,
            Ok(PollStatus::Progress(_))
        ));
    }

    #[tokio::test]
    async fn get_forwards_parameters_and_uses_zero_hash_for_size_zero() {
        let h = harness(Some(RootHash::new([1; ROOT_HASH_LEN])));
        let mut request = get_request("bafy", "/out/file", 0);
        request.export_archive = true;
        h.coordinator.get_file(request.clone()).await.expect("start");

        match h.queue.take() {
            StoreOperation::Get(get) => {
                assert_eq!(get.content_id, "bafy");
                assert_eq!(get.output_path, "/out/file");
                assert!(get.export_archive);
                assert_eq!(get.timeout, Some(Duration::from_secs(30)));
                get.completion.succeed("/out/file_digest");
            }
            StoreOperation::Add(_) => panic!("expected get"),
        }

        let ready = h.coordinator.get_file(request).await.expect("ready");
        assert_eq!(
            ready,
            PollStatus::Ready(GetFileResult {
                output_path: "/out/file_digest".to_string(),
                root_hash: RootHash::ZERO,
            })
        );
        assert_eq!(h.hasher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_computes_root_hash_once() {
        let expected = RootHash::new([4; ROOT_HASH_LEN]);
        let h = harness(Some(expected));
        let request = get_request("bafy", "/out/file", 12);
        h.coordinator.get_file(request.clone()).await.expect("start");
        h.queue.take_completion().succeed("/out/file_digest");

        for _ in 0..2 {
            match h.coordinator.get_file(request.clone()).await.expect("ready") {
                PollStatus::Ready(result) => assert_eq!(result.root_hash, expected),
                PollStatus::Progress(_) => panic!("expected result"),
            }
        }
        assert_eq!(h.hasher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_root_hash_skips_computation() {
        let pushed = RootHash::new([8; ROOT_HASH_LEN]);
        let h = harness(Some(RootHash::ZERO));
        h.coordinator.cache_root_hash(CacheRootHashRequest {
            path: "/out/file_digest".to_string(),
            tree_log2_size: 20,
            root_hash: pushed,
        });

        let request = get_request("bafy", "/out/file", 20);
        h.coordinator.get_file(request.clone()).await.expect("start");
        h.queue.take_completion().succeed("/out/file_digest");

        match h.coordinator.get_file(request).await.expect("ready") {
            PollStatus::Ready(result) => assert_eq!(result.root_hash, pushed),
            PollStatus::Progress(_) => panic!("expected result"),
        }
        assert_eq!(h.hasher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_tree_size_evicts_completed_record() {
        let h = harness(Some(RootHash::ZERO));
        let request = get_request("bafy", "/out/file", 2);
        h.coordinator.get_file(request.clone()).await.expect("start");
        h.queue.take_completion().succeed("/out/file_digest");

        assert!(matches!(
            h.coordinator.get_file(request.clone()).await,
            Err(OperationError::InvalidArgument { .. })
        ));
        assert_eq!(h.coordinator.tracked_requests(), 0);

        let restarted = h.coordinator.get_file(request).await.expect("restart");
        assert!(matches!(restarted, PollStatus::Progress(_)));
        assert_eq!(h.queue.count(), 1);
    }

    #[tokio::test]
    async fn hash_tool_failure_surfaces_and_allows_retry() {
        let h = harness(None);
        let request = get_request("bafy", "/out/file", 10);
        h.coordinator.get_file(request.clone()).await.expect("start");
        h.queue.take_completion().succeed("/out/file_digest");

        let err = h
            .coordinator
            .get_file(request)
            .await
            .expect_err("hash failure");
        assert!(err.detail().contains("input too large"));
        assert_eq!(h.coordinator.tracked_requests(), 0);
        assert!(h.coordinator.root_hashes.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_first_polls_dispatch_once() {
        let h = harness(None);
        let coordinator = Arc::new(h.coordinator);

        let polls: Vec<_> = (0..200)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.add_file(add_request("/data/x")).await })
            })
            .collect();
        for poll in polls {
            let status = poll.await.expect("poll task").expect("poll");
            assert!(matches!(status, PollStatus::Progress(_)));
        }

        assert_eq!(h.queue.count(), 1, "one key must dispatch one operation");
        assert_eq!(coordinator.tracked_requests(), 1);

        h.queue.take_completion().succeed("QmX");
        assert!(matches!(
            coordinator.add_file(add_request("/data/x")).await,
            Ok(PollStatus::Ready(AddFileResult { ref content_id })) if content_id == "QmX"
        ));
        assert_eq!(h.queue.count(), 0);
    }
}
