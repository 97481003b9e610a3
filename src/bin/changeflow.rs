//! # Changeflow
//!
//! Runs the change orchestrator until Ctrl-C.
//!
//! Configuration comes from `config/changeflow.toml`, the environment overlay
//! `config/changeflow.{CHANGEFLOW_ENV}.toml` and `CHANGEFLOW__*` variables,
//! e.g. `CHANGEFLOW__REMOTE__SHARED_SECRET`. Set `CHANGEFLOW_CONFIG_DIR` to
//! load from another directory.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use changeflow_core::config::ConfigManager;
use changeflow_core::logging::init_structured_logging;
use changeflow_core::messaging::InMemoryMessagingService;
use changeflow_core::orchestration::ChangeOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load configuration")?;
    let config = manager.config().clone();

    info!(
        environment = %manager.environment(),
        config_directory = %manager.config_directory().display(),
        config = %config.sanitized(),
        "Configuration loaded"
    );

    let messaging = Arc::new(InMemoryMessagingService::new());
    let orchestrator = ChangeOrchestrator::with_signed_client(config, messaging)
        .context("failed to build change orchestrator")?;

    orchestrator
        .start()
        .await
        .context("failed to start change orchestrator")?;

    if !orchestrator.is_running() {
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    orchestrator.stop().await?;

    let status = orchestrator.status();
    info!(
        initiation_worker = ?status.initiation_worker,
        completion_poller = ?status.completion_poller,
        "Final worker statistics"
    );
    Ok(())
}
