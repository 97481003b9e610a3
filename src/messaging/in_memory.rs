//! # In-Memory Messaging Service
//!
//! Thread-safe in-memory queue implementation for tests, development and the
//! bundled binary.
//!
//! ## Features
//!
//! - **Visibility Timeout**: Messages become invisible after receive, re-visible after timeout
//! - **Delayed Delivery**: `send_message_with_delay` hides a message until its delay elapses
//! - **Thread-Safe**: Uses `tokio::sync::RwLock` for concurrent access
//!
//! Visibility is tracked with `tokio::time::Instant`, so tests running under
//! a paused clock observe delays deterministically.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::{MessagingService, QueueMessage};
use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// In-memory message with visibility tracking
#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    key: String,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<Instant>,
    receive_count: u32,
}

impl InMemoryQueuedMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.visible_at.map(|vt| vt <= now).unwrap_or(true)
    }

    fn to_queued(&self) -> QueuedMessage {
        QueuedMessage {
            receipt_handle: ReceiptHandle::from(self.id),
            key: self.key.clone(),
            payload: self.payload.clone(),
            receive_count: self.receive_count,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// In-memory queue with message storage
#[derive(Debug)]
struct InMemoryQueue {
    /// Messages in the queue (FIFO order)
    messages: VecDeque<InMemoryQueuedMessage>,
    next_id: u64,
    total_sent: u64,
    total_received: u64,
    total_acked: u64,
    total_nacked: u64,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            next_id: 1,
            total_sent: 0,
            total_received: 0,
            total_acked: 0,
            total_nacked: 0,
        }
    }

    fn position(&self, receipt_handle: &ReceiptHandle) -> Result<usize, MessagingError> {
        let message_id: u64 = receipt_handle
            .as_str()
            .parse()
            .map_err(|_| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))?;

        self.messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| MessagingError::message_not_found(message_id.to_string()))
    }
}

/// In-memory messaging service
///
/// # Example
///
/// ```rust
/// use changeflow_core::messaging::{InMemoryMessagingService, MessagingService};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = InMemoryMessagingService::new();
/// service.ensure_queue("change_results").await?;
///
/// service
///     .send_message("change_results", "Result:r1", &serde_json::json!({"status": "COMPLETED"}))
///     .await?;
///
/// let messages = service
///     .receive_messages("change_results", 10, Duration::from_secs(30))
///     .await?;
/// assert_eq!(messages[0].key, "Result:r1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMessagingService {
    /// Queue storage (queue_name -> queue)
    queues: RwLock<HashMap<String, InMemoryQueue>>,
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-initialized queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let mut queues = HashMap::new();
        for name in queue_names {
            queues.insert(name.to_string(), InMemoryQueue::new());
        }
        Self {
            queues: RwLock::new(queues),
        }
    }

    /// Number of messages in a queue regardless of visibility
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Snapshot of every message in a queue without touching visibility
    pub async fn peek_all(&self, queue_name: &str) -> Vec<QueuedMessage> {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.iter().map(InMemoryQueuedMessage::to_queued).collect())
            .unwrap_or_default()
    }

    /// Publish pre-encoded bytes, bypassing serialization.
    ///
    /// Lets tests and bridges inject payloads that are not valid messages.
    pub async fn send_raw(
        &self,
        queue_name: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<MessageId, MessagingError> {
        self.push(queue_name, key, payload, Duration::ZERO).await
    }

    async fn push(
        &self,
        queue_name: &str,
        key: &str,
        payload: Vec<u8>,
        delay: Duration,
    ) -> Result<MessageId, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = queue.next_id;
        queue.next_id += 1;
        queue.total_sent += 1;

        let visible_at = if delay.is_zero() {
            None
        } else {
            Some(Instant::now() + delay)
        };

        queue.messages.push_back(InMemoryQueuedMessage {
            id,
            key: key.to_string(),
            payload,
            enqueued_at: Utc::now(),
            visible_at,
            receive_count: 0,
        });

        Ok(MessageId::from(id))
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        queues
            .entry(queue_name.to_string())
            .or_insert_with(InMemoryQueue::new);
        Ok(())
    }

    async fn send_message_with_delay<T: QueueMessage>(
        &self,
        queue_name: &str,
        key: &str,
        message: &T,
        delay: Duration,
    ) -> Result<MessageId, MessagingError> {
        let payload = message.to_bytes()?;
        self.push(queue_name, key, payload, delay).await
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage>, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Instant::now();
        let visible_until = now + visibility_timeout;
        let mut received = Vec::new();

        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }

            if msg.is_visible(now) {
                msg.visible_at = Some(visible_until);
                msg.receive_count += 1;
                received.push(msg.to_queued());
            }
        }

        queue.total_received += received.len() as u64;
        Ok(received)
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue.position(receipt_handle)?;
        queue.messages.remove(pos);
        queue.total_acked += 1;
        Ok(())
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue.position(receipt_handle)?;
        if requeue {
            queue.messages[pos].visible_at = None;
        } else {
            queue.messages.remove(pos);
        }
        queue.total_nacked += 1;
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Instant::now();
        let hidden = |m: &&InMemoryQueuedMessage| !m.is_visible(now);

        let in_flight_count = queue
            .messages
            .iter()
            .filter(hidden)
            .filter(|m| m.receive_count > 0)
            .count() as u64;
        let delayed_count = queue
            .messages
            .iter()
            .filter(hidden)
            .filter(|m| m.receive_count == 0)
            .count() as u64;

        let mut stats = QueueStats::new(queue_name, queue.messages.len() as u64)
            .with_in_flight_count(in_flight_count)
            .with_delayed_count(delayed_count)
            .with_counters(
                queue.total_sent,
                queue.total_received,
                queue.total_acked,
                queue.total_nacked,
            );

        if let Some(oldest) = queue.messages.front() {
            if let Ok(age) = (Utc::now() - oldest.enqueued_at).to_std() {
                stats = stats.with_oldest_message_age(age);
            }
        }

        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
