//! # Messaging Module
//!
//! Channel abstraction for the change workflow. Requests, pending-tracking
//! records and terminal results travel over durable queues with
//! at-least-once delivery.

pub mod errors;
pub mod in_memory;
pub mod message;
pub mod traits;
pub mod types;

pub use errors::{MessagingError, MessagingResult};
pub use in_memory::InMemoryMessagingService;
pub use message::{ChangeAction, ChangeRequest, PendingTracking, ResultStatus, TerminalResult};
pub use traits::{MessagingService, QueueMessage};
pub use types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
