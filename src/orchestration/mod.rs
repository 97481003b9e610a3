//! # Change Orchestration
//!
//! Two independent loops drive every change request to exactly one terminal
//! result:
//!
//! - [`InitiationWorker`] consumes the request channel and submits changes
//! - [`CompletionPoller`] consumes the pending channel and checks completion
//!
//! Both publish through a [`ResultEmitter`]. Workflow state is never
//! persisted; it travels with the in-flight message for each correlation ID.

pub mod bootstrap;
pub mod completion_poller;
pub mod initiation_worker;
pub mod result_emitter;
pub mod state;
pub mod stats;
pub mod worker;

pub use bootstrap::{ChangeOrchestrator, OrchestratorStatus};
pub use completion_poller::CompletionPoller;
pub use initiation_worker::InitiationWorker;
pub use result_emitter::ResultEmitter;
pub use state::{ChangeState, RemoteDisposition, RemoteStateClassifier};
pub use stats::{WorkerStats, WorkerStatsSnapshot};
pub use worker::{run_worker_loop, ChannelWorker};
