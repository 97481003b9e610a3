//! # Error Types
//!
//! Crate-wide error enum. Component errors (messaging, remote calls,
//! configuration) convert into [`ChangeflowError`] at the orchestration seam.

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::remote::RemoteCallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangeflowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
    #[error("Remote call error: {0}")]
    Remote(#[from] RemoteCallError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Web server error: {0}")]
    Web(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChangeflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for ChangeflowError {
    fn from(error: serde_json::Error) -> Self {
        ChangeflowError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, ChangeflowError>;
