//! # Remote Call Errors
//!
//! Tagged failure kinds for calls to the remote change API, plus the coarse
//! classification callers use to pick an HTTP status or a log level.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which remote operation produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    InitiateChange,
    CheckStatus,
}

impl RemoteOperation {
    /// Lower-case noun phrase used inside error sentences
    pub fn noun(&self) -> &'static str {
        match self {
            Self::InitiateChange => "service change",
            Self::CheckStatus => "service change status check",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitiateChange => write!(f, "Service change"),
            Self::CheckStatus => write!(f, "Service change status check"),
        }
    }
}

/// Failure of a single remote call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteCallError {
    /// Remote answered with an error envelope
    #[error("{operation} failed: {code} - {message}")]
    Rejected {
        operation: RemoteOperation,
        status: u16,
        code: i64,
        message: String,
    },

    /// Connection, DNS, TLS or timeout failure before a response arrived
    #[error("Unable to issue {}: {message}", .operation.noun())]
    Transport {
        operation: RemoteOperation,
        message: String,
        timed_out: bool,
    },

    /// Response arrived but could not be interpreted
    #[error("Unable to unmarshal {} response: {message}", .operation.noun())]
    Protocol {
        operation: RemoteOperation,
        status: Option<u16>,
        message: String,
    },
}

/// Coarse classification of failures across the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    MalformedInput,
    RemoteRejection,
    Transport,
    Protocol,
    Timeout,
}

impl ErrorClass {
    /// Status code surfaced by the REST entry point
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedInput => 400,
            Self::RemoteRejection => 502,
            Self::Transport => 503,
            Self::Protocol => 500,
            Self::Timeout => 504,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedInput => "malformed_input",
            Self::RemoteRejection => "remote_rejection",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

impl RemoteCallError {
    pub fn rejected(
        operation: RemoteOperation,
        status: u16,
        code: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            operation,
            status,
            code,
            message: message.into(),
        }
    }

    pub fn transport(operation: RemoteOperation, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(operation: RemoteOperation, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn protocol(
        operation: RemoteOperation,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            operation,
            status,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> RemoteOperation {
        match self {
            Self::Rejected { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Protocol { operation, .. } => *operation,
        }
    }

    /// HTTP status returned by the remote, if a response was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Protocol { status, .. } => *status,
            Self::Transport { .. } => None,
        }
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            Self::Rejected { .. } => ErrorClass::RemoteRejection,
            Self::Transport {
                timed_out: true, ..
            } => ErrorClass::Timeout,
            Self::Transport { .. } => ErrorClass::Transport,
            Self::Protocol { .. } => ErrorClass::Protocol,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}
