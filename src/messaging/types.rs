//! # Messaging Service Types
//!
//! Core types for the provider-agnostic channel abstraction.

use std::time::Duration;

use super::traits::QueueMessage;
use super::MessagingError;

/// Unique identifier for a queued message
///
/// The format is provider-specific; the in-memory provider uses a
/// per-queue sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle for acknowledging a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// A message received from a queue, payload still encoded.
///
/// Consumers decode explicitly so an undeserializable body can be told apart
/// from a channel failure.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Handle for acknowledging this message
    pub receipt_handle: ReceiptHandle,

    /// Key the producer published under (e.g. `Pending:<correlation id>`)
    pub key: String,

    /// Encoded payload
    pub payload: Vec<u8>,

    /// Number of times this message has been received
    ///
    /// Increments each time the message becomes visible after visibility timeout.
    pub receive_count: u32,

    /// When the message was originally enqueued
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl QueuedMessage {
    /// Decode the payload into a message type
    pub fn decode<T: QueueMessage>(&self) -> Result<T, MessagingError> {
        T::from_bytes(&self.payload)
    }

    /// Payload as lossy UTF-8, for logging
    pub fn payload_preview(&self) -> String {
        const MAX_PREVIEW: usize = 256;
        let text = String::from_utf8_lossy(&self.payload);
        if text.chars().count() > MAX_PREVIEW {
            let truncated: String = text.chars().take(MAX_PREVIEW).collect();
            format!("{truncated}...")
        } else {
            text.into_owned()
        }
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub queue_name: String,

    /// Total number of messages in the queue (visible, delayed and in flight)
    pub message_count: u64,

    /// Messages received but not yet acknowledged
    pub in_flight_count: Option<u64>,

    /// Messages published with a delay that have not become visible yet
    pub delayed_count: Option<u64>,

    #[serde(skip)]
    pub oldest_message_age: Option<Duration>,

    pub total_sent: u64,
    pub total_received: u64,
    pub total_acked: u64,
    pub total_nacked: u64,
}

impl QueueStats {
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            in_flight_count: None,
            delayed_count: None,
            oldest_message_age: None,
            total_sent: 0,
            total_received: 0,
            total_acked: 0,
            total_nacked: 0,
        }
    }

    pub fn with_in_flight_count(mut self, count: u64) -> Self {
        self.in_flight_count = Some(count);
        self
    }

    pub fn with_delayed_count(mut self, count: u64) -> Self {
        self.delayed_count = Some(count);
        self
    }

    pub fn with_oldest_message_age(mut self, age: Duration) -> Self {
        self.oldest_message_age = Some(age);
        self
    }

    pub fn with_counters(mut self, sent: u64, received: u64, acked: u64, nacked: u64) -> Self {
        self.total_sent = sent;
        self.total_received = received;
        self.total_acked = acked;
        self.total_nacked = nacked;
        self
    }
}
