//! # Web API Error Types
//!
//! Errors surfaced by the REST entry point and their HTTP conversion. Every
//! error body has the shape `{"code": <http status>, "message": <text>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::messaging::MessagingError;
use crate::remote::{ErrorClass, RemoteCallError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    MalformedInput { message: String },

    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    #[error("Unable to enqueue change request: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },
}

/// Error body returned to REST callers
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedInput { .. } => StatusCode::BAD_REQUEST,
            Self::Remote(e) => StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Messaging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::MalformedInput { .. } => Some(ErrorClass::MalformedInput),
            Self::Remote(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(
            status = status.as_u16(),
            error_kind = ?self.class(),
            error = %self,
            "Request failed"
        );

        let body = ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
