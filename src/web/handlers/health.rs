//! # Health Check Handler
//!
//! `GET /health` reports the messaging backend, channel depths and worker
//! counters. Answers 503 when the messaging backend is unreachable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use crate::messaging::{MessagingService, QueueStats};
use crate::orchestration::OrchestratorStatus;
use crate::remote::RemoteApi;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub orchestrator: OrchestratorStatus,
    pub queues: Vec<QueueStats>,
}

pub async fn health_check<M: MessagingService, R: RemoteApi>(
    State(state): State<AppState<M, R>>,
) -> (StatusCode, Json<HealthResponse>) {
    let orchestrator = &state.orchestrator;

    let messaging_ok = match orchestrator.messaging().health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            error!(error = %e, "Messaging health check failed");
            false
        }
    };

    let queues = match orchestrator.queue_stats().await {
        Ok(queues) => queues,
        Err(e) => {
            debug!(error = %e, "Queue statistics unavailable");
            Vec::new()
        }
    };

    let (status_code, status) = if messaging_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            orchestrator: orchestrator.status(),
            queues,
        }),
    )
}
