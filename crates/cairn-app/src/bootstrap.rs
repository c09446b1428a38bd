use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use cairn_api::ApiServer;
use cairn_core::{FileWorkflow, OperationQueue, RootHasher};
use cairn_ipfs::IpfsDispatcher;
use cairn_telemetry::Metrics;
use cairn_tracker::{FileCoordinator, MerkleTreeHashTool};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Collaborators wired together by the boot sequence.
pub(crate) struct BootstrapDependencies {
    telemetry: Metrics,
    queue: Arc<dyn OperationQueue>,
    hasher: Arc<dyn RootHasher>,
    dispatcher: Option<JoinHandle<()>>,
}

impl BootstrapDependencies {
    /// Production dependencies: a Kubo-backed dispatcher and the external hash tool.
    pub(crate) fn from_config(config: &AppConfig) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let (dispatcher, handle) = IpfsDispatcher::connect(&config.gateway)
            .map_err(|err| AppError::store("ipfs_dispatcher.connect", err))?;
        info!(
            gateway = %config.gateway,
            merkle_tree_hash = %config.merkle_tree_hash.display(),
            "content store dispatcher started"
        );
        Ok(Self {
            telemetry,
            queue: Arc::new(dispatcher),
            hasher: Arc::new(MerkleTreeHashTool::new(config.merkle_tree_hash.clone())),
            dispatcher: Some(handle),
        })
    }
}

/// Entry point for the Cairn boot sequence.
///
/// # Errors
///
/// Returns an error if logging cannot be installed, the configuration is
/// invalid, or the API listener fails.
pub async fn run_app() -> AppResult<()> {
    let config = AppConfig::parse();
    cairn_telemetry::init_logging(&config.logging())
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!("Cairn bootstrap starting");

    let addr = config.socket_addr()?;
    let dependencies = BootstrapDependencies::from_config(&config)?;
    run_app_with(dependencies, addr, shutdown_signal()).await
}

/// Boot sequence over injected dependencies.
pub(crate) async fn run_app_with<F>(
    dependencies: BootstrapDependencies,
    addr: SocketAddr,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let BootstrapDependencies {
        telemetry,
        queue,
        hasher,
        dispatcher,
    } = dependencies;

    let workflow: Arc<dyn FileWorkflow> =
        Arc::new(FileCoordinator::new(queue, hasher, telemetry.clone()));
    let api = ApiServer::new(workflow, telemetry);

    info!(addr = %addr, "Launching API listener");
    let serve_result = api.serve(addr, shutdown).await;

    if let Some(worker) = dispatcher {
        if !worker.is_finished() {
            worker.abort();
        }
        if let Err(err) = worker.await {
            if !err.is_cancelled() {
                warn!(error = %err, "dispatcher task join failed");
            }
        }
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("Cairn stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use cairn_core::{OperationError, RootHash, StoreOperation};

    struct DroppingQueue;

    impl OperationQueue for DroppingQueue {
        fn submit(&self, operation: StoreOperation) {
            drop(operation);
        }
    }

    struct ZeroHasher;

    #[async_trait]
    impl RootHasher for ZeroHasher {
        async fn compute(
            &self,
            _path: &str,
            _tree_log2_size: u32,
        ) -> Result<RootHash, OperationError> {
            Ok(RootHash::ZERO)
        }
    }

    fn dependencies(dispatcher: Option<JoinHandle<()>>) -> Result<BootstrapDependencies> {
        Ok(BootstrapDependencies {
            telemetry: Metrics::new()?,
            queue: Arc::new(DroppingQueue),
            hasher: Arc::new(ZeroHasher),
            dispatcher,
        })
    }

    #[tokio::test]
    async fn immediate_shutdown_stops_cleanly_and_reaps_dispatcher() -> Result<()> {
        let idle = tokio::spawn(std::future::pending::<()>());
        let addr: SocketAddr = "127.0.0.1:0".parse()?;
        run_app_with(dependencies(Some(idle))?, addr, async {}).await?;
        Ok(())
    }

    #[tokio::test]
    async fn occupied_port_reports_bind_failure() -> Result<()> {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = occupied.local_addr()?;
        let err = run_app_with(dependencies(None)?, addr, async {})
            .await
            .expect_err("port already bound");
        assert!(matches!(
            err,
            AppError::ApiServer {
                operation: "api_server.serve",
                source: cairn_api::ApiServerError::Bind { .. },
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn production_dependencies_validate_gateway() -> Result<()> {
        let config = AppConfig::try_parse_from(["cairn", "-g", "127.0.0.1:5999"])?;
        let dependencies = BootstrapDependencies::from_config(&config)?;
        assert!(dependencies.dispatcher.is_some());

        let bad = AppConfig::try_parse_from(["cairn", "-g", "not a host:5001"])?;
        assert!(matches!(
            BootstrapDependencies::from_config(&bad),
            Err(AppError::Store {
                operation: "ipfs_dispatcher.connect",
                ..
            })
        ));
        Ok(())
    }
}
