//! # Worker Loop
//!
//! Shared receive loop for the channel workers. A worker processes one batch
//! to completion, then checks for shutdown; when its channel is empty it
//! sleeps for the idle interval, waking early on shutdown. Errors from a batch
//! are logged and the loop keeps going.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info};

use crate::error::Result;

/// A consumer of one channel driven by [`run_worker_loop`]
#[async_trait]
pub trait ChannelWorker: Send + Sync {
    /// Name used in logs
    fn worker_name(&self) -> &'static str;

    fn queue_name(&self) -> &str;

    fn idle_poll_interval(&self) -> Duration;

    /// Receive and fully process one batch; returns the number of messages handled
    async fn process_batch(&self) -> Result<usize>;
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    // Closed or lagged senders also mean the owner is gone
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

pub async fn run_worker_loop<W>(worker: &W, mut shutdown: broadcast::Receiver<()>)
where
    W: ChannelWorker + ?Sized,
{
    info!(
        worker = worker.worker_name(),
        queue = %worker.queue_name(),
        "🚀 Worker loop started"
    );

    loop {
        if shutdown_requested(&mut shutdown) {
            break;
        }

        let idle = match worker.process_batch().await {
            Ok(0) => true,
            Ok(count) => {
                debug!(worker = worker.worker_name(), count = count, "Processed batch");
                false
            }
            Err(e) => {
                error!(
                    worker = worker.worker_name(),
                    queue = %worker.queue_name(),
                    error = %e,
                    "Batch processing failed"
                );
                true
            }
        };

        if idle {
            tokio::select! {
                _ = tokio::time::sleep(worker.idle_poll_interval()) => {}
                _ = shutdown.recv() => break,
            }
        }
    }

    info!(
        worker = worker.worker_name(),
        queue = %worker.queue_name(),
        "🛑 Worker loop stopped"
    );
}
