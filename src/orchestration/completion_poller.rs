//! # Completion Poller
//!
//! Consumes pending-tracking records and checks the remote state of each
//! accepted change exactly once per delivery. Instead of sleeping in-line, a
//! still-pending change is re-published to the pending channel with the poll
//! interval as delivery delay and its attempt counter incremented, so one slow
//! change never blocks the loop from serving other correlation IDs.
//!
//! Per delivery:
//! - status check fails (transport, non-200, bad body): FAILED, stop
//! - remote reports a terminal state: COMPLETED / FAILED / OTHER_TERMINAL, stop
//! - remote reports the pending marker: re-enqueue with `attempt + 1`, or
//!   FAILED with a timeout message once `max_attempts` checks have been spent
//!
//! The worst-case wait per correlation ID is `poll_interval * max_attempts`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::result_emitter::ResultEmitter;
use super::state::{ChangeState, RemoteDisposition, RemoteStateClassifier};
use super::stats::{WorkerStats, WorkerStatsSnapshot};
use super::worker::ChannelWorker;
use crate::config::{ChangeflowConfig, ChannelConfig};
use crate::error::{ChangeflowError, Result};
use crate::logging::log_change_operation;
use crate::messaging::{
    MessagingService, PendingTracking, QueuedMessage, ResultStatus, TerminalResult,
};
use crate::remote::{ErrorClass, RemoteApi};

pub struct CompletionPoller<M: MessagingService, R: RemoteApi> {
    messaging: Arc<M>,
    remote: Arc<R>,
    emitter: ResultEmitter<M>,
    channels: ChannelConfig,
    classifier: RemoteStateClassifier,
    poll_interval: Duration,
    max_attempts: u32,
    stats: Arc<WorkerStats>,
}

impl<M: MessagingService, R: RemoteApi> CompletionPoller<M, R> {
    pub fn new(messaging: Arc<M>, remote: Arc<R>, config: &ChangeflowConfig) -> Self {
        let emitter = ResultEmitter::new(Arc::clone(&messaging), config.channels.result_queue.clone());
        Self {
            messaging,
            remote,
            emitter,
            channels: config.channels.clone(),
            classifier: RemoteStateClassifier::from_config(&config.poller),
            poll_interval: config.poller.poll_interval(),
            max_attempts: config.poller.max_attempts,
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
        let pending: PendingTracking = match message.decode() {
            Ok(pending) => pending,
            Err(e) => {
                self.stats.record_dropped();
                error!(
                    queue = %self.channels.pending_queue,
                    key = %message.key,
                    error = %e,
                    payload = %message.payload_preview(),
                    "Dropping undeserializable pending tracking record"
                );
                return Ok(None);
            }
        };

        self.poll_once(&pending).await.map(Some)
    }

    /// One status check for `pending`, followed by its transition
    pub async fn poll_once(&self, pending: &PendingTracking) -> Result<ChangeState> {
        self.stats.record_status_poll();
        let attempt = pending.attempt.saturating_add(1);

        let report = match self.remote.check_status(&pending.external_id).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    correlation_id = %pending.correlation_id,
                    external_id = %pending.external_id,
                    attempt = attempt,
                    error_kind = %e.kind(),
                    error = %e,
                    "Status check failed, giving up on change"
                );
                let result = TerminalResult::failed(
                    &pending.correlation_id,
                    &pending.external_id,
                    e.to_string(),
                );
                self.emit(&result).await?;
                return Ok(ChangeState::Failed);
            }
        };

        debug!(
            correlation_id = %pending.correlation_id,
            external_id = %pending.external_id,
            attempt = attempt,
            remote_state = %report.state,
            "Status check returned"
        );

        match self.classifier.classify(&report.state) {
            RemoteDisposition::Terminal(status) => {
                let result = terminal_result(pending, status, &report.state);
                self.emit(&result).await?;
                Ok(status.into())
            }
            RemoteDisposition::StillPending if attempt >= self.max_attempts => {
                warn!(
                    correlation_id = %pending.correlation_id,
                    external_id = %pending.external_id,
                    attempts = attempt,
                    error_kind = %ErrorClass::Timeout,
                    "Change still pending after final status check"
                );
                let result = TerminalResult::failed(
                    &pending.correlation_id,
                    &pending.external_id,
                    format!(
                        "Service change {} timed out: still {} after {} status checks",
                        pending.external_id, report.state, attempt
                    ),
                )
                .with_remote_state(report.state);
                self.emit(&result).await?;
                Ok(ChangeState::Failed)
            }
            RemoteDisposition::StillPending => {
                self.reschedule(&pending.next_attempt(), &report.state).await
            }
        }
    }

    async fn reschedule(&self, next: &PendingTracking, remote_state: &str) -> Result<ChangeState> {
        let published = self
            .messaging
            .send_message_with_delay(
                &self.channels.pending_queue,
                &next.message_key(),
                next,
                self.poll_interval,
            )
            .await;

        match published {
            Ok(_) => {
                self.stats.record_pending_emitted();
                log_change_operation(
                    "reschedule_poll",
                    &next.correlation_id,
                    Some(next.external_id.as_str()),
                    &ChangeState::Pending.to_string(),
                    Some(
                        format!(
                            "attempt {} of {}",
                            next.attempt.saturating_add(1),
                            self.max_attempts
                        )
                        .as_str(),
                    ),
                );
                Ok(ChangeState::Pending)
            }
            Err(e) => {
                // The delivery being handled is acked, so nothing else tracks this change
                self.stats.record_emit_failure();
                error!(
                    correlation_id = %next.correlation_id,
                    external_id = %next.external_id,
                    attempt = next.attempt,
                    error = %e,
                    "Failed to re-publish pending tracking record"
                );
                let result = TerminalResult::failed(
                    &next.correlation_id,
                    &next.external_id,
                    format!("Unable to track service change {}: {e}", next.external_id),
                )
                .with_remote_state(remote_state);
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

fn terminal_result(pending: &PendingTracking, status: ResultStatus, remote_state: &str) -> TerminalResult {
    match status {
        ResultStatus::Failed => TerminalResult::failed(
            &pending.correlation_id,
            &pending.external_id,
            format!(
                "Service change {} reported state {}",
                pending.external_id, remote_state
            ),
        )
        .with_remote_state(remote_state),
        other => TerminalResult::completed(&pending.correlation_id, &pending.external_id, remote_state)
            .with_status(other),
    }
}

#[async_trait]
impl<M: MessagingService, R: RemoteApi> ChannelWorker for CompletionPoller<M, R> {
    fn worker_name(&self) -> &'static str {
        "completion_poller"
    }

    fn queue_name(&self) -> &str {
        &self.channels.pending_queue
    }

    fn idle_poll_interval(&self) -> Duration {
        self.channels.idle_poll_interval()
    }

    async fn process_batch(&self) -> Result<usize> {
        let messages = self
            .messaging
            .receive_messages(
                &self.channels.pending_queue,
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
                    "Pending record handled"
                ),
                Ok(None) => {}
                Err(e) => error!(key = %message.key, error = %e, "Pending record handling failed"),
            }

            // The successor record, if any, is already published
            if let Err(e) = self
                .messaging
                .ack_message(&self.channels.pending_queue, &message.receipt_handle)
                .await
            {
                error!(
                    queue = %self.channels.pending_queue,
                    receipt_handle = %message.receipt_handle,
                    error = %e,
                    "Failed to acknowledge pending tracking record"
                );
            }
        }

        if !messages.is_empty() {
            info!(
                queue = %self.channels.pending_queue,
                count = messages.len(),
                "Polling batch complete"
            );
        }
        Ok(messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteApiConfig;
    use crate::messaging::{ChangeRequest, InMemoryMessagingService};
    use crate::remote::{
        InitiatedChange, RemoteCallError, RemoteOperation, StatusReport,
    };
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays scripted status responses in order
    struct ScriptedRemote {
        statuses: Mutex<VecDeque<std::result::Result<String, RemoteCallError>>>,
    }

    impl ScriptedRemote {
        fn new(statuses: Vec<std::result::Result<&str, RemoteCallError>>) -> Self {
            Self {
                statuses: Mutex::new(
                    statuses
                        .into_iter()
                        .map(|s| s.map(str::to_string))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedRemote {
        async fn initiate_change(
            &self,
            _request: &ChangeRequest,
        ) -> std::result::Result<InitiatedChange, RemoteCallError> {
            unreachable!("poller never initiates")
        }

        async fn check_status(
            &self,
            _external_id: &str,
        ) -> std::result::Result<StatusReport, RemoteCallError> {
            let next = self
                .statuses
                .lock()
                .await
                .pop_front()
                .expect("status script exhausted");
            next.map(|state| StatusReport {
                state,
                status_code: 200,
            })
        }
    }

    fn build_poller(
        statuses: Vec<std::result::Result<&str, RemoteCallError>>,
        max_attempts: u32,
    ) -> (Arc<InMemoryMessagingService>, CompletionPoller<InMemoryMessagingService, ScriptedRemote>) {
        let mut config = ChangeflowConfig {
            remote: RemoteApiConfig::new("http://remote.test", "app", "secret"),
            ..ChangeflowConfig::default()
        };
        config.poller.max_attempts = max_attempts;
        config.poller.poll_interval_ms = 10;

        let messaging = Arc::new(InMemoryMessagingService::with_queues(&[
            "change_pending",
            "change_results",
        ]));
        let poller = CompletionPoller::new(
            Arc::clone(&messaging),
            Arc::new(ScriptedRemote::new(statuses)),
            &config,
        );
        (messaging, poller)
    }

    async fn only_result(messaging: &InMemoryMessagingService) -> TerminalResult {
        let results = messaging.peek_all("change_results").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "Result:r1");
        results[0].decode().unwrap()
    }

    #[tokio::test]
    async fn test_completed_state_emits_result() {
        let (messaging, poller) = build_poller(vec![Ok("COMPLETED")], 5);

        let state = poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        assert_eq!(state, ChangeState::Completed);

        let result = only_result(&messaging).await;
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.external_id, "rec-9");
        assert_eq!(result.remote_state.as_deref(), Some("COMPLETED"));
        assert_eq!(messaging.queue_length("change_pending").await, 0);
    }

    #[tokio::test]
    async fn test_pending_state_reschedules_with_next_attempt() {
        let (messaging, poller) = build_poller(vec![Ok("PENDING")], 5);

        let state = poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        assert_eq!(state, ChangeState::Pending);
        assert_eq!(messaging.queue_length("change_results").await, 0);

        let rescheduled = messaging.peek_all("change_pending").await;
        assert_eq!(rescheduled[0].key, "Pending:r1");
        let next: PendingTracking = rescheduled[0].decode().unwrap();
        assert_eq!(next.attempt, 1);
    }

    #[tokio::test]
    async fn test_final_pending_check_times_out() {
        let (messaging, poller) = build_poller(vec![Ok("PENDING")], 3);
        let mut pending = PendingTracking::new("r1", "rec-9");
        pending.attempt = 2;

        let state = poller.poll_once(&pending).await.unwrap();
        assert_eq!(state, ChangeState::Failed);

        let result = only_result(&messaging).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.error_message.unwrap().contains("timed out"));
        assert_eq!(messaging.queue_length("change_pending").await, 0);
    }

    #[tokio::test]
    async fn test_status_check_failure_is_terminal() {
        let (messaging, poller) = build_poller(
            vec![Err(RemoteCallError::rejected(
                RemoteOperation::CheckStatus,
                404,
                404,
                "unknown recommendation",
            ))],
            5,
        );

        let state = poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        assert_eq!(state, ChangeState::Failed);

        let result = only_result(&messaging).await;
        assert_eq!(
            result.error_message.as_deref(),
            Some("Service change status check failed: 404 - unknown recommendation")
        );
        assert_eq!(messaging.queue_length("change_pending").await, 0);
    }

    #[tokio::test]
    async fn test_remote_failed_and_other_terminal_states() {
        let (messaging, poller) = build_poller(vec![Ok("FAILED")], 5);
        poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        let result = only_result(&messaging).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.remote_state.as_deref(), Some("FAILED"));

        let (messaging, poller) = build_poller(vec![Ok("CANCELLED")], 5);
        let state = poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        assert_eq!(state, ChangeState::OtherTerminal);
        let result = only_result(&messaging).await;
        assert_eq!(result.status, ResultStatus::OtherTerminal);
        assert_eq!(result.remote_state.as_deref(), Some("CANCELLED"));
    }

    #[tokio::test]
    async fn test_reschedule_failure_reports_failed() {
        let mut config = ChangeflowConfig {
            remote: RemoteApiConfig::new("http://remote.test", "app", "secret"),
            ..ChangeflowConfig::default()
        };
        config.poller.poll_interval_ms = 10;
        // No pending queue, so the successor record cannot be published
        let messaging = Arc::new(InMemoryMessagingService::with_queues(&["change_results"]));
        let poller = CompletionPoller::new(
            Arc::clone(&messaging),
            Arc::new(ScriptedRemote::new(vec![Ok("PENDING")])),
            &config,
        );

        let state = poller.poll_once(&PendingTracking::new("r1", "rec-9")).await.unwrap();
        assert_eq!(state, ChangeState::Failed);

        let result = only_result(&messaging).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.remote_state.as_deref(), Some("PENDING"));
        assert!(result
            .error_message
            .unwrap()
            .starts_with("Unable to track service change rec-9"));

        let stats = poller.stats();
        assert_eq!(stats.emit_failures, 1);
        assert_eq!(stats.results_emitted, 1);
        assert_eq!(stats.pending_emitted, 0);
    }

    #[tokio::test]
    async fn test_saturated_attempt_counter_times_out() {
        let (messaging, poller) = build_poller(vec![Ok("PENDING")], 5);
        let mut pending = PendingTracking::new("r1", "rec-9");
        pending.attempt = u32::MAX;

        let state = poller.poll_once(&pending).await.unwrap();
        assert_eq!(state, ChangeState::Failed);

        let result = only_result(&messaging).await;
        assert!(result.error_message.unwrap().contains("timed out"));
        assert_eq!(messaging.queue_length("change_pending").await, 0);
    }

    #[tokio::test]
    async fn test_malformed_pending_record_dropped() {
        let (messaging, poller) = build_poller(vec![], 5);
        messaging
            .send_raw("change_pending", "Pending:r1", br#"{"correlationID": 7}"#.to_vec())
            .await
            .unwrap();

        assert_eq!(poller.process_batch().await.unwrap(), 1);
        assert_eq!(messaging.queue_length("change_pending").await, 0);
        assert_eq!(messaging.queue_length("change_results").await, 0);
        assert_eq!(poller.stats().messages_dropped, 1);
    }
}
