//! # Orchestration Bootstrap
//!
//! Wires the two worker loops (and optionally the REST entry point) over one
//! messaging provider and one shared remote client, and owns their lifecycle.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use changeflow_core::config::ConfigManager;
//! use changeflow_core::messaging::InMemoryMessagingService;
//! use changeflow_core::orchestration::ChangeOrchestrator;
//!
//! # async fn example() -> changeflow_core::Result<()> {
//! let manager = ConfigManager::load()?;
//! let orchestrator = ChangeOrchestrator::with_signed_client(
//!     manager.config().clone(),
//!     Arc::new(InMemoryMessagingService::new()),
//! )?;
//!
//! orchestrator.start().await?;
//! // ...
//! orchestrator.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::completion_poller::CompletionPoller;
use super::initiation_worker::InitiationWorker;
use super::stats::WorkerStatsSnapshot;
use super::worker::run_worker_loop;
use crate::config::ChangeflowConfig;
use crate::error::{ChangeflowError, Result};
use crate::messaging::{MessagingService, QueueStats};
use crate::remote::{RemoteApi, SignedClient};
use crate::web;

/// Lifecycle snapshot reported by `/health` and the binary
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub enabled: bool,
    pub running: bool,
    pub environment: String,
    pub messaging_provider: &'static str,
    pub initiation_worker: WorkerStatsSnapshot,
    pub completion_poller: WorkerStatsSnapshot,
}

pub struct ChangeOrchestrator<M: MessagingService, R: RemoteApi> {
    config: ChangeflowConfig,
    environment: String,
    messaging: Arc<M>,
    remote: Arc<R>,
    initiation_worker: Arc<InitiationWorker<M, R>>,
    completion_poller: Arc<CompletionPoller<M, R>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl<M: MessagingService> ChangeOrchestrator<M, SignedClient> {
    /// Orchestrator talking to the configured remote through a [`SignedClient`]
    pub fn with_signed_client(config: ChangeflowConfig, messaging: Arc<M>) -> Result<Arc<Self>> {
        config.validate()?;
        let client = SignedClient::new(config.remote.clone())?;
        Ok(Arc::new(Self::new(config, messaging, Arc::new(client))))
    }
}

impl<M: MessagingService, R: RemoteApi> ChangeOrchestrator<M, R> {
    pub fn new(config: ChangeflowConfig, messaging: Arc<M>, remote: Arc<R>) -> Self {
        let initiation_worker = Arc::new(InitiationWorker::new(
            Arc::clone(&messaging),
            Arc::clone(&remote),
            &config,
        ));
        let completion_poller = Arc::new(CompletionPoller::new(
            Arc::clone(&messaging),
            Arc::clone(&remote),
            &config,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            environment: crate::logging::get_environment(),
            messaging,
            remote,
            initiation_worker,
            completion_poller,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn config(&self) -> &ChangeflowConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn messaging(&self) -> &Arc<M> {
        &self.messaging
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn initiation_worker(&self) -> &Arc<InitiationWorker<M, R>> {
        &self.initiation_worker
    }

    pub fn completion_poller(&self) -> &Arc<CompletionPoller<M, R>> {
        &self.completion_poller
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Create the channels and spawn both worker loops.
    ///
    /// A disabled orchestrator logs and returns without starting anything.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if !self.config.enabled {
            warn!("Change orchestration is disabled; workers not started");
            return Ok(());
        }
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Change orchestrator already running");
            return Ok(());
        }

        if let Err(e) = self.spawn_all().await {
            self.running.store(false, Ordering::Release);
            self.shutdown_and_join().await;
            return Err(e);
        }

        info!(
            environment = %self.environment,
            provider = self.messaging.provider_name(),
            request_queue = %self.config.channels.request_queue,
            pending_queue = %self.config.channels.pending_queue,
            result_queue = %self.config.channels.result_queue,
            "✅ Change orchestrator started"
        );
        Ok(())
    }

    async fn spawn_all(self: &Arc<Self>) -> Result<()> {
        self.messaging
            .ensure_queues(&self.config.channels.all_queues())
            .await?;

        let mut tasks = self.tasks.lock().await;

        let worker = Arc::clone(&self.initiation_worker);
        let shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            run_worker_loop(worker.as_ref(), shutdown).await
        }));

        let poller = Arc::clone(&self.completion_poller);
        let shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            run_worker_loop(poller.as_ref(), shutdown).await
        }));

        if self.config.web.enabled {
            let listener = tokio::net::TcpListener::bind(&self.config.web.bind_address)
                .await
                .map_err(|e| {
                    ChangeflowError::Web(format!(
                        "failed to bind {}: {e}",
                        self.config.web.bind_address
                    ))
                })?;
            let router = web::create_router(web::AppState::new(Arc::clone(self)));
            let shutdown = self.shutdown_tx.subscribe();
            info!(bind_address = %self.config.web.bind_address, "🌐 REST entry point listening");
            tasks.push(tokio::spawn(async move {
                if let Err(e) = web::serve(listener, router, shutdown).await {
                    error!(error = %e, "REST entry point stopped with error");
                }
            }));
        }

        Ok(())
    }

    /// Signal shutdown and wait for every loop to finish its current message
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            warn!("Change orchestrator already stopped");
            return Ok(());
        }

        info!("🛑 Change orchestrator shutdown requested");
        self.shutdown_and_join().await;
        info!("Change orchestrator stopped");
        Ok(())
    }

    async fn shutdown_and_join(&self) {
        // No receivers just means nothing was spawned
        let _ = self.shutdown_tx.send(());

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Orchestration task panicked or was cancelled");
            }
        }
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            enabled: self.config.enabled,
            running: self.is_running(),
            environment: self.environment.clone(),
            messaging_provider: self.messaging.provider_name(),
            initiation_worker: self.initiation_worker.stats(),
            completion_poller: self.completion_poller.stats(),
        }
    }

    /// Depth and counters of the three channels
    pub async fn queue_stats(&self) -> Result<Vec<QueueStats>> {
        let mut stats = Vec::new();
        for queue in self.config.channels.all_queues() {
            stats.push(self.messaging.queue_stats(&queue).await?);
        }
        Ok(stats)
    }
}
