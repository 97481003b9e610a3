//! Wire models of the remote change API.

use serde::{Deserialize, Serialize};

use crate::messaging::ChangeRequest;

/// Body of `POST /recommendation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub service_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_change: Option<i64>,
}

impl From<&ChangeRequest> for RecommendationRequest {
    fn from(request: &ChangeRequest) -> Self {
        Self {
            service_id: request.target_id.clone(),
            action: request.action.as_str().to_string(),
            bandwidth_change: request.parameter,
        }
    }
}

/// `201 Created` body of `POST /recommendation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendation_id: String,
}

/// `200 OK` body of `GET /recommendation/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationState {
    pub state: String,
}

/// Error body returned with any non-success status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorEnvelope {
    pub code: i64,
    pub message: String,
}

/// Accepted initiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedChange {
    pub external_id: String,
    pub status_code: u16,
}

/// Successful status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: String,
    pub status_code: u16,
}
