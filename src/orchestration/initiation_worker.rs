//! # Initiation Worker
//!
//! Consumes change requests and submits them to the remote change API.
//!
//! - accepted: publishes a [`PendingTracking`] record to the pending channel,
//!   delayed by the poll interval so the first status check happens one
//!   interval after initiation
//! - rejected or unreachable: publishes a FAILED [`TerminalResult`] carrying
//!   the error message; no pending record is produced
//! - undeserializable or invalid body: logged and dropped with no result
//!
//! Every received message is acknowledged once handled. Re-delivering an
//! initiated request would submit the change twice, so publish failures are
//! logged rather than retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::result_emitter::ResultEmitter;
use super::state::ChangeState;
use super::stats::{WorkerStats, WorkerStatsSnapshot};
use super::worker::ChannelWorker;
use crate::config::{ChangeflowConfig, ChannelConfig};
use crate::error::{ChangeflowError, Result};
use crate::logging::log_change_operation;
use crate::messaging::{
    ChangeRequest, MessagingService, PendingTracking, QueuedMessage, TerminalResult,
};
use crate::remote::RemoteApi;

pub struct InitiationWorker<M: MessagingService, R: RemoteApi> {
    messaging: Arc<M>,
    remote: Arc<R>,
    emitter: ResultEmitter<M>,
    channels: ChannelConfig,
    poll_interval: Duration,
    stats: Arc<WorkerStats>,
}

impl<M: MessagingService, R: RemoteApi> InitiationWorker<M, R> {
    pub fn new(messaging: Arc<M>, remote: Arc<R>, config: &ChangeflowConfig) -> Self {
        let emitter = ResultEmitter::new(Arc::clone(&messaging), config.channels.result_queue.clone());
        Self {
            messaging,
            remote,
            emitter,
            channels: config.channels.clone(),
            poll_interval: config.poller.poll_interval(),
            stats: Arc::new(WorkerStats::new()),
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Decode and handle one delivered message.
    ///
    /// Returns `None` when the body was malformed and the message dropped.
    pub async fn process_message(&self, message: &QueuedMessage) -> Result<Option<ChangeState>> {
        let request: ChangeRequest = match message.decode() {
            Ok(request) => request,
            Err(e) => {
                self.stats.record_dropped();
                error!(
                    queue = %self.channels.request_queue,
                    key = %message.key,
                    error = %e,
                    payload = %message.payload_preview(),
                    "Dropping undeserializable change request"
                );
                return Ok(None);
            }
        };

        if let Err(reason) = request.validate() {
            self.stats.record_dropped();
            error!(
                queue = %self.channels.request_queue,
                correlation_id = %request.correlation_id,
                reason = %reason,
                "Dropping invalid change request"
            );
            return Ok(None);
        }

        self.process_request(&request).await.map(Some)
    }

    /// Run the RECEIVED state for one request
    pub async fn process_request(&self, request: &ChangeRequest) -> Result<ChangeState> {
        log_change_operation(
            "receive_request",
            &request.correlation_id,
            None,
            &ChangeState::Received.to_string(),
            serde_json::to_string(request).ok().as_deref(),
        );

        match self.remote.initiate_change(request).await {
            Ok(accepted) => {
                let pending = PendingTracking::new(&request.correlation_id, &accepted.external_id);
                self.publish_pending(&pending).await
            }
            Err(e) => {
                warn!(
                    correlation_id = %request.correlation_id,
                    error_kind = %e.kind(),
                    error = %e,
                    "Remote change initiation failed"
                );
                let result = TerminalResult::failed(&request.correlation_id, "", e.to_string());
                self.emit(&result).await?;
                Ok(ChangeState::Failed)
            }
        }
    }

    async fn publish_pending(&self, pending: &PendingTracking) -> Result<ChangeState> {
        let published = self
            .messaging
            .send_message_with_delay(
                &self.channels.pending_queue,
                &pending.message_key(),
                pending,
                self.poll_interval,
            )
            .await;

        match published {
            Ok(_) => {
                self.stats.record_pending_emitted();
                log_change_operation(
                    "initiate_change",
                    &pending.correlation_id,
                    Some(pending.external_id.as_str()),
                    &ChangeState::Pending.to_string(),
                    None,
                );
                Ok(ChangeState::Pending)
            }
            Err(e) => {
                // Without a pending record nobody will ever poll this change
                self.stats.record_emit_failure();
                error!(
                    correlation_id = %pending.correlation_id,
                    external_id = %pending.external_id,
                    error = %e,
                    "Failed to publish pending tracking record"
                );
                let result = TerminalResult::failed(
                    &pending.correlation_id,
                    &pending.external_id,
                    format!("Unable to track service change {}: {e}", pending.external_id),
                );
                self.emit(&result).await?;
                Ok(ChangeState::Failed)
            }
        }
    }

    async fn emit(&self, result: &TerminalResult) -> Result<()> {
        match self.emitter.emit(result).await {
            Ok(_) => {
                self.stats.record_result_emitted();
                Ok(())
            }
            Err(e) => {
                self.stats.record_emit_failure();
                Err(ChangeflowError::from(e))
            }
        }
    }
}

#[async_trait]
impl<M: MessagingService, R: RemoteApi> ChannelWorker for InitiationWorker<M, R> {
    fn worker_name(&self) -> &'static str {
        "initiation_worker"
    }

    fn queue_name(&self) -> &str {
        &self.channels.request_queue
    }

    fn idle_poll_interval(&self) -> Duration {
        self.channels.idle_poll_interval()
    }

    async fn process_batch(&self) -> Result<usize> {
        let messages = self
            .messaging
            .receive_messages(
                &self.channels.request_queue,
                self.channels.batch_size,
                self.channels.visibility_timeout(),
            )
            .await?;

        for message in &messages {
            self.stats.record_received();

            match self.process_message(message).await {
                Ok(Some(state)) => debug!(
                    key = %message.key,
                    state = %state,
                    tracking_finished = state.is_terminal(),
                    "Change request handled"
                ),
                Ok(None) => {}
                Err(e) => error!(key = %message.key, error = %e, "Change request handling failed"),
            }

            if let Err(e) = self
                .messaging
                .ack_message(&self.channels.request_queue, &message.receipt_handle)
                .await
            {
                error!(
                    queue = %self.channels.request_queue,
                    receipt_handle = %message.receipt_handle,
                    error = %e,
                    "Failed to acknowledge change request"
                );
            }
        }

        if !messages.is_empty() {
            info!(
                queue = %self.channels.request_queue,
                count = messages.len(),
                "Initiation batch complete"
            );
        }
        Ok(messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteApiConfig;
    use crate::messaging::{ChangeAction, InMemoryMessagingService, ResultStatus};
    use crate::remote::{InitiatedChange, RemoteCallError, RemoteOperation, StatusReport};

    struct FixedRemote {
        outcome: std::result::Result<String, RemoteCallError>,
    }

    #[async_trait]
    impl RemoteApi for FixedRemote {
        async fn initiate_change(
            &self,
            _request: &ChangeRequest,
        ) -> std::result::Result<InitiatedChange, RemoteCallError> {
            self.outcome.clone().map(|external_id| InitiatedChange {
                external_id,
                status_code: 201,
            })
        }

        async fn check_status(
            &self,
            _external_id: &str,
        ) -> std::result::Result<StatusReport, RemoteCallError> {
            unreachable!("initiation never checks status")
        }
    }

    fn config() -> ChangeflowConfig {
        ChangeflowConfig {
            remote: RemoteApiConfig::new("http://remote.test", "app", "secret"),
            ..ChangeflowConfig::default()
        }
    }

    fn worker(
        outcome: std::result::Result<String, RemoteCallError>,
    ) -> (Arc<InMemoryMessagingService>, InitiationWorker<InMemoryMessagingService, FixedRemote>) {
        let config = config();
        let messaging = Arc::new(InMemoryMessagingService::with_queues(&[
            "change_requests",
            "change_pending",
            "change_results",
        ]));
        let worker = InitiationWorker::new(
            Arc::clone(&messaging),
            Arc::new(FixedRemote { outcome }),
            &config,
        );
        (messaging, worker)
    }

    fn request() -> ChangeRequest {
        ChangeRequest::new("r1", "svc-1", ChangeAction::ModifyCapacity, Some(50))
    }

    #[tokio::test]
    async fn test_accepted_change_publishes_pending() {
        let (messaging, worker) = worker(Ok("rec-9".to_string()));

        let state = worker.process_request(&request()).await.unwrap();
        assert_eq!(state, ChangeState::Pending);

        let pending = messaging.peek_all("change_pending").await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, "Pending:r1");
        let tracking: PendingTracking = pending[0].decode().unwrap();
        assert_eq!(tracking, PendingTracking::new("r1", "rec-9"));

        assert_eq!(messaging.queue_length("change_results").await, 0);
        assert_eq!(worker.stats().pending_emitted, 1);
    }

    #[tokio::test]
    async fn test_rejected_change_emits_failure_only() {
        let (messaging, worker) = worker(Err(RemoteCallError::rejected(
            RemoteOperation::InitiateChange,
            409,
            409,
            "busy",
        )));

        let state = worker.process_request(&request()).await.unwrap();
        assert_eq!(state, ChangeState::Failed);
        assert_eq!(messaging.queue_length("change_pending").await, 0);

        let results = messaging.peek_all("change_results").await;
        let result: TerminalResult = results[0].decode().unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Service change failed: 409 - busy")
        );
        assert_eq!(result.external_id, "");
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped_and_acked() {
        let (messaging, worker) = worker(Ok("rec-1".to_string()));
        messaging
            .send_raw("change_requests", "bad", b"{not json".to_vec())
            .await
            .unwrap();

        let handled = worker.process_batch().await.unwrap();
        assert_eq!(handled, 1);
        assert_eq!(messaging.queue_length("change_requests").await, 0);
        assert_eq!(messaging.queue_length("change_results").await, 0);
        assert_eq!(messaging.queue_length("change_pending").await, 0);

        let stats = worker.stats();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_dropped() {
        let (messaging, worker) = worker(Ok("rec-1".to_string()));
        let invalid = ChangeRequest::new("r1", "  ", ChangeAction::ModifyCapacity, Some(5));
        messaging
            .send_message("change_requests", "r1", &invalid)
            .await
            .unwrap();

        worker.process_batch().await.unwrap();
        assert_eq!(messaging.queue_length("change_results").await, 0);
        assert_eq!(messaging.queue_length("change_pending").await, 0);
        assert_eq!(worker.stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_capacity_change_without_parameter_is_initiated() {
        let (messaging, worker) = worker(Ok("rec-2".to_string()));
        messaging
            .send_raw(
                "change_requests",
                "r1",
                br#"{"correlationID":"r1","targetID":"svc-1","action":"modify-capacity"}"#.to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(worker.process_batch().await.unwrap(), 1);
        assert_eq!(worker.stats().messages_dropped, 0);

        let pending: PendingTracking = messaging.peek_all("change_pending").await[0]
            .decode()
            .unwrap();
        assert_eq!(pending, PendingTracking::new("r1", "rec-2"));
    }

    #[tokio::test]
    async fn test_pending_publish_failure_reports_failed() {
        let config = config();
        let messaging = Arc::new(InMemoryMessagingService::with_queues(&["change_results"]));
        let worker = InitiationWorker::new(
            Arc::clone(&messaging),
            Arc::new(FixedRemote {
                outcome: Ok("rec-3".to_string()),
            }),
            &config,
        );

        let state = worker.process_request(&request()).await.unwrap();
        assert_eq!(state, ChangeState::Failed);

        let result: TerminalResult = messaging.peek_all("change_results").await[0]
            .decode()
            .unwrap();
        assert_eq!(result.external_id, "rec-3");
        assert!(result
            .error_message
            .unwrap()
            .starts_with("Unable to track service change rec-3"));
        assert_eq!(worker.stats().emit_failures, 1);
    }
}
