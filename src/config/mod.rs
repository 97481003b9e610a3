//! # Changeflow Configuration System
//!
//! Layered configuration for the change orchestrator. Defaults live in code,
//! TOML files and `CHANGEFLOW__*` environment variables override them, and the
//! merged result is validated before any worker is constructed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use changeflow_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let server = &manager.config().remote.server;
//! let attempts = manager.config().poller.max_attempts;
//! # Ok(())
//! # }
//! ```
//!
//! The remote credentials are immutable once loaded: the Signed Client takes
//! its own copy of [`RemoteApiConfig`] at construction.

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::constants::{defaults, queues, remote, remote_states};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/changeflow.toml`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChangeflowConfig {
    /// Master switch; workers are not started when false
    pub enabled: bool,

    /// Remote change API endpoint and credentials
    pub remote: RemoteApiConfig,

    /// Channel names and consumer settings
    pub channels: ChannelConfig,

    /// Completion polling bounds
    pub poller: PollerConfig,

    /// Synchronous REST entry point
    pub web: WebConfig,
}

impl Default for ChangeflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: RemoteApiConfig::default(),
            channels: ChannelConfig::default(),
            poller: PollerConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl ChangeflowConfig {
    /// Validate cross-field constraints after merging all sources
    pub fn validate(&self) -> ConfigResult<()> {
        self.remote.validate()?;
        self.channels.validate()?;
        self.poller.validate()?;
        Ok(())
    }

    /// JSON rendering with the shared secret masked, for logging
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(secret) = value.pointer_mut("/remote/shared_secret") {
            *secret = serde_json::Value::String(mask(&self.remote.shared_secret));
        }
        value
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

/// Remote change API configuration.
///
/// Shared read-only by both workers through the Signed Client.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteApiConfig {
    /// Base URL; request paths are appended to it
    pub server: String,
    pub app_id: String,
    pub shared_secret: String,
    pub app_id_header: String,
    pub signature_header: String,
    pub request_timeout_ms: u64,
    pub max_idle_connections: usize,
    pub idle_connection_timeout_ms: u64,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            app_id: String::new(),
            shared_secret: String::new(),
            app_id_header: remote::DEFAULT_APP_ID_HEADER.to_string(),
            signature_header: remote::DEFAULT_SIGNATURE_HEADER.to_string(),
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            max_idle_connections: defaults::MAX_IDLE_CONNECTIONS,
            idle_connection_timeout_ms: defaults::IDLE_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("server", &self.server)
            .field("app_id", &self.app_id)
            .field("shared_secret", &mask(&self.shared_secret))
            .field("app_id_header", &self.app_id_header)
            .field("signature_header", &self.signature_header)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("idle_connection_timeout_ms", &self.idle_connection_timeout_ms)
            .finish()
    }
}

impl RemoteApiConfig {
    pub fn new(
        server: impl Into<String>,
        app_id: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            app_id: app_id.into(),
            shared_secret: shared_secret.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_connection_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.server.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "server",
                "remote",
            ));
        }
        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            return Err(ConfigurationError::invalid_value(
                "server",
                self.server.clone(),
                "remote server must be an http(s) URL",
            ));
        }
        if self.app_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "app_id", "remote",
            ));
        }
        if self.shared_secret.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "shared_secret",
                "remote",
            ));
        }
        Ok(())
    }
}

/// Channel names and consumer behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub request_queue: String,
    pub pending_queue: String,
    pub result_queue: String,
    pub consumer_group: String,
    /// Messages pulled per receive; the workers process them strictly in order
    pub batch_size: usize,
    pub visibility_timeout_ms: u64,
    /// Sleep between receives when a channel is empty
    pub idle_poll_interval_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_queue: queues::CHANGE_REQUESTS.to_string(),
            pending_queue: queues::CHANGE_PENDING.to_string(),
            result_queue: queues::CHANGE_RESULTS.to_string(),
            consumer_group: queues::DEFAULT_CONSUMER_GROUP.to_string(),
            batch_size: defaults::BATCH_SIZE,
            visibility_timeout_ms: defaults::VISIBILITY_TIMEOUT_MS,
            idle_poll_interval_ms: defaults::IDLE_POLL_INTERVAL_MS,
        }
    }
}

impl ChannelConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn all_queues(&self) -> Vec<String> {
        vec![
            self.request_queue.clone(),
            self.pending_queue.clone(),
            self.result_queue.clone(),
        ]
    }

    fn validate(&self) -> ConfigResult<()> {
        let names = self.all_queues();
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigurationError::missing_required_field(
                "queue name",
                "channels",
            ));
        }
        let unique: HashSet<&String> = names.iter().collect();
        if unique.len() != names.len() {
            return Err(ConfigurationError::invalid_value(
                "channels",
                names.join(","),
                "request, pending and result queues must be distinct",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch_size",
                "0",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Completion poller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Delay before each status check
    pub poll_interval_ms: u64,
    /// Total status checks allowed while the remote reports the pending marker
    pub max_attempts: u32,
    pub pending_state: String,
    pub completed_state: String,
    pub failed_state: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            max_attempts: defaults::MAX_POLL_ATTEMPTS,
            pending_state: remote_states::PENDING.to_string(),
            completed_state: remote_states::COMPLETED.to_string(),
            failed_state: remote_states::FAILED.to_string(),
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound on the wall-clock wait for one correlation ID
    pub fn max_wait(&self) -> Duration {
        self.poll_interval() * self.max_attempts
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_attempts",
                "0",
                "at least one status check is required",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "poll_interval_ms",
                "0",
                "poll interval must be positive",
            ));
        }
        if self.pending_state.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "pending_state",
                "poller",
            ));
        }
        Ok(())
    }
}

/// REST entry point configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: defaults::BIND_ADDRESS.to_string(),
        }
    }
}
