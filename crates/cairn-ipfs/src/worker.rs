use std::path::PathBuf;
use std::sync::Arc;

use cairn_core::{AddOperation, GetOperation, OperationError, StoreOperation};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::export::DagExporter;
use crate::session::StoreSession;

pub(crate) fn spawn(
    mut operations: mpsc::Receiver<StoreOperation>,
    session: Box<dyn StoreSession>,
    exporter: Arc<dyn DagExporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut worker = Worker { session, exporter };
        while let Some(operation) = operations.recv().await {
            worker.handle(operation).await;
        }
        debug!("operation queue closed; dispatcher exiting");
    })
}

/// Local path a get writes to: the caller's output path suffixed with the
/// hex SHA-256 of the content id, so distinct content never collides.
#[must_use]
pub fn safe_output_path(output_path: &str, content_id: &str) -> PathBuf {
    let digest = Sha256::digest(content_id.as_bytes());
    PathBuf::from(format!("{output_path}_{}", hex::encode(digest)))
}

struct Worker {
    session: Box<dyn StoreSession>,
    exporter: Arc<dyn DagExporter>,
}

impl Worker {
    async fn handle(&mut self, operation: StoreOperation) {
        match operation {
            StoreOperation::Add(add) => self.handle_add(add).await,
            StoreOperation::Get(get) => self.handle_get(get).await,
        }
    }

    async fn handle_add(&mut self, operation: AddOperation) {
        let AddOperation {
            file_path,
            completion,
        } = operation;
        self.session.set_timeout(None);

        let delivered = match self.session.add_directory(&file_path).await {
            Ok(content_id) => {
                info!(path = %file_path, content_id = %content_id, "added content");
                completion.succeed(content_id)
            }
            Err(err) => {
                warn!(path = %file_path, error = %err, "add failed");
                completion.fail(OperationError::store("add", file_path.as_str(), err))
            }
        };
        if !delivered {
            debug!(path = %file_path, "add result discarded; status record gone");
        }
    }

    async fn handle_get(&mut self, operation: GetOperation) {
        let GetOperation {
            content_id,
            output_path,
            export_archive,
            timeout,
            completion,
        } = operation;
        self.session.set_timeout(timeout);
        let local_path = safe_output_path(&output_path, &content_id);

        let outcome = if export_archive {
            self.exporter
                .export(&content_id, &local_path)
                .await
                .map_err(|err| OperationError::export(content_id.as_str(), &local_path, err))
        } else {
            self.session
                .fetch(&content_id, &local_path)
                .await
                .map_err(|err| OperationError::store("get", content_id.as_str(), err))
        };

        let delivered = match outcome {
            Ok(()) => {
                info!(
                    content_id = %content_id,
                    path = %local_path.display(),
                    export_archive,
                    "materialized content"
                );
                completion.succeed(local_path.to_string_lossy())
            }
            Err(err) => {
                warn!(
                    content_id = %content_id,
                    path = %local_path.display(),
                    export_archive,
                    error = %err.detail(),
                    "get failed"
                );
                completion.fail(err)
            }
        };
        if !delivered {
            debug!(content_id = %content_id, "get result discarded; status record gone");
        }
    }
}
