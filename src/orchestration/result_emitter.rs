//! # Result Emitter
//!
//! Publishes terminal results to the result channel keyed
//! `Result:<correlation id>`. Failures are logged and returned to the caller;
//! nothing is retried here because the owning worker has already finished its
//! state machine for the correlation ID.

use std::sync::Arc;

use tracing::error;

use crate::logging::log_change_operation;
use crate::messaging::{MessageId, MessagingError, MessagingService, TerminalResult};

#[derive(Debug)]
pub struct ResultEmitter<M: MessagingService> {
    messaging: Arc<M>,
    result_queue: String,
}

impl<M: MessagingService> Clone for ResultEmitter<M> {
    fn clone(&self) -> Self {
        Self {
            messaging: Arc::clone(&self.messaging),
            result_queue: self.result_queue.clone(),
        }
    }
}

impl<M: MessagingService> ResultEmitter<M> {
    pub fn new(messaging: Arc<M>, result_queue: impl Into<String>) -> Self {
        Self {
            messaging,
            result_queue: result_queue.into(),
        }
    }

    pub fn result_queue(&self) -> &str {
        &self.result_queue
    }

    pub async fn emit(&self, result: &TerminalResult) -> Result<MessageId, MessagingError> {
        let key = result.message_key();

        match self
            .messaging
            .send_message(&self.result_queue, &key, result)
            .await
        {
            Ok(message_id) => {
                log_change_operation(
                    "emit_result",
                    &result.correlation_id,
                    Some(result.external_id.as_str()).filter(|id| !id.is_empty()),
                    &result.status.to_string(),
                    result.error_message.as_deref(),
                );
                Ok(message_id)
            }
            Err(e) => {
                error!(
                    correlation_id = %result.correlation_id,
                    queue = %self.result_queue,
                    status = %result.status,
                    error = %e,
                    "Failed to publish terminal result"
                );
                Err(e)
            }
        }
    }
}
