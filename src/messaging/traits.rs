//! # Messaging Service Traits
//!
//! Provider-agnostic channel operations. The orchestrator only assumes
//! at-least-once delivery: a message that is received but never acknowledged
//! becomes visible again after its visibility timeout.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// Core messaging service trait
///
/// Implementations provide the actual channel backend. Any queue system that
/// supports keyed publish, delayed visibility, receive with visibility timeout
/// and explicit acknowledgment can back the workers.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Create a queue if it doesn't exist (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Bulk queue creation (called during bootstrap)
    async fn ensure_queues(&self, queue_names: &[String]) -> Result<(), MessagingError> {
        for queue_name in queue_names {
            self.ensure_queue(queue_name).await?;
        }
        Ok(())
    }

    /// Publish a message under `key`, visible immediately
    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        key: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        self.send_message_with_delay(queue_name, key, message, Duration::ZERO)
            .await
    }

    /// Publish a message that becomes visible to consumers after `delay`
    async fn send_message_with_delay<T: QueueMessage>(
        &self,
        queue_name: &str,
        key: &str,
        message: &T,
        delay: Duration,
    ) -> Result<MessageId, MessagingError>;

    /// Receive up to `max_messages` visible messages.
    ///
    /// Received messages stay invisible to other consumers for
    /// `visibility_timeout` unless acknowledged first.
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage>, MessagingError>;

    /// Acknowledge successful processing (delete message)
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError>;

    /// Negative acknowledge: `requeue` makes the message visible again,
    /// otherwise it is discarded.
    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError>;

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Health check - verify the messaging backend is reachable
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
///
/// Types implementing this trait can be sent through the messaging system.
pub trait QueueMessage: Send + Sync + Clone + 'static {
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON encoding for any serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}
