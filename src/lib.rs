#![allow(clippy::doc_markdown)] // Allow technical terms like HMAC, SHA-256 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Changeflow Core
//!
//! Asynchronous change-request orchestration over durable message channels.
//!
//! ## Overview
//!
//! A caller publishes a change request for some externally-managed resource.
//! Changeflow submits it to a remote change API over signed HTTP, tracks the
//! change's asynchronous completion by polling, and publishes exactly one
//! terminal result per accepted request. Callers never block on the remote
//! system's completion latency.
//!
//! ## Architecture
//!
//! ```text
//! request channel --> InitiationWorker --(201)--> pending channel --> CompletionPoller
//!                          |                           ^                  |
//!                          | (rejected)                +--(still pending)-+
//!                          v                                              v
//!                    result channel <-------------(terminal / failed)-----+
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration (`config` crate + environment overrides)
//! - [`messaging`] - Channel abstraction, in-memory provider and message types
//! - [`remote`] - Signed client for the remote change API
//! - [`orchestration`] - Worker loops, result emitter and lifecycle
//! - [`web`] - Optional REST entry point
//! - [`logging`] - Structured logging bootstrap
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use changeflow_core::config::ConfigManager;
//! use changeflow_core::messaging::InMemoryMessagingService;
//! use changeflow_core::orchestration::ChangeOrchestrator;
//!
//! # async fn example() -> changeflow_core::Result<()> {
//! changeflow_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let orchestrator = ChangeOrchestrator::with_signed_client(
//!     manager.config().clone(),
//!     Arc::new(InMemoryMessagingService::new()),
//! )?;
//! orchestrator.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod remote;
pub mod web;

pub use config::{ChangeflowConfig, ConfigManager, ConfigurationError};
pub use error::{ChangeflowError, Result};
pub use messaging::{
    ChangeAction, ChangeRequest, InMemoryMessagingService, MessagingService, PendingTracking,
    ResultStatus, TerminalResult,
};
pub use orchestration::{ChangeOrchestrator, ChangeState, CompletionPoller, InitiationWorker};
pub use remote::{ErrorClass, RemoteApi, RemoteCallError, SignedClient};
