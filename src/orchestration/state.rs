//! # Change State
//!
//! Lifecycle of one correlation ID and the mapping from remote-reported
//! states onto it.
//!
//! ```text
//! RECEIVED --initiate ok--> PENDING --terminal state--> COMPLETED | FAILED | OTHER_TERMINAL
//!     |                        |
//!     +--initiate failed-------+--status check failed / attempts exhausted--> FAILED
//! ```
//!
//! State is never persisted; it lives in whichever message is currently in
//! flight for the correlation ID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::PollerConfig;
use crate::messaging::ResultStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeState {
    Received,
    Pending,
    Completed,
    Failed,
    OtherTerminal,
}

impl ChangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::OtherTerminal)
    }
}

impl From<ResultStatus> for ChangeState {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Completed => Self::Completed,
            ResultStatus::Failed => Self::Failed,
            ResultStatus::OtherTerminal => Self::OtherTerminal,
        }
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::OtherTerminal => "OTHER_TERMINAL",
        };
        f.write_str(name)
    }
}

impl FromStr for ChangeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RECEIVED" => Ok(Self::Received),
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "OTHER_TERMINAL" => Ok(Self::OtherTerminal),
            other => Err(format!("unknown change state: {other}")),
        }
    }
}

/// What a remote-reported state means for the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDisposition {
    StillPending,
    Terminal(ResultStatus),
}

/// Maps remote state strings using the configured markers
#[derive(Debug, Clone)]
pub struct RemoteStateClassifier {
    pending: String,
    completed: String,
    failed: String,
}

impl RemoteStateClassifier {
    pub fn new(
        pending: impl Into<String>,
        completed: impl Into<String>,
        failed: impl Into<String>,
    ) -> Self {
        Self {
            pending: pending.into(),
            completed: completed.into(),
            failed: failed.into(),
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(
            config.pending_state.clone(),
            config.completed_state.clone(),
            config.failed_state.clone(),
        )
    }

    /// Anything other than the pending marker is terminal
    pub fn classify(&self, remote_state: &str) -> RemoteDisposition {
        if remote_state == self.pending {
            RemoteDisposition::StillPending
        } else if remote_state == self.completed {
            RemoteDisposition::Terminal(ResultStatus::Completed)
        } else if remote_state == self.failed {
            RemoteDisposition::Terminal(ResultStatus::Failed)
        } else {
            RemoteDisposition::Terminal(ResultStatus::OtherTerminal)
        }
    }
}

impl Default for RemoteStateClassifier {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}
