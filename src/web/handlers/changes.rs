//! # Change Request Handlers
//!
//! `POST /service-change/recommendation` submits a change synchronously and
//! answers with the remote external ID. `POST /service-change/requests`
//! enqueues the change on the request channel for the worker loops and
//! answers immediately with the correlation ID, assigning a fresh one when
//! the caller left it out.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::logging::log_change_operation;
use crate::messaging::{ChangeRequest, MessagingService};
use crate::remote::RemoteApi;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationCreated {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestAccepted {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
}

fn parse_change_request(body: &[u8]) -> ApiResult<ChangeRequest> {
    if body.is_empty() {
        return Err(ApiError::malformed_input("request body is empty"));
    }
    let request: ChangeRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::malformed_input(format!("Unable to read service change data: {e}")))?;
    request.validate().map_err(ApiError::malformed_input)?;
    Ok(request)
}

/// Like [`parse_change_request`], filling in a v4 UUID correlation ID if absent
fn parse_with_correlation_id(body: &[u8]) -> ApiResult<ChangeRequest> {
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::malformed_input(format!("Unable to read service change data: {e}")))?;

    if let Value::Object(fields) = &mut value {
        let missing = match fields.get("correlationID") {
            None | Some(Value::Null) => true,
            Some(Value::String(id)) => id.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            fields.insert(
                "correlationID".to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
    }

    let bytes = serde_json::to_vec(&value)
        .map_err(|e| ApiError::malformed_input(format!("Unable to prepare service change data: {e}")))?;
    parse_change_request(&bytes)
}

/// Synchronous initiation: POST /service-change/recommendation
pub async fn create_recommendation<M: MessagingService, R: RemoteApi>(
    State(state): State<AppState<M, R>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<RecommendationCreated>)> {
    let request = parse_change_request(&body)?;

    let accepted = state
        .orchestrator
        .remote()
        .initiate_change(&request)
        .await?;

    log_change_operation(
        "create_recommendation",
        &request.correlation_id,
        Some(accepted.external_id.as_str()),
        "ACCEPTED",
        None,
    );

    Ok((
        StatusCode::CREATED,
        Json(RecommendationCreated {
            correlation_id: request.correlation_id,
            external_id: accepted.external_id,
        }),
    ))
}

/// Asynchronous submission: POST /service-change/requests
pub async fn enqueue_request<M: MessagingService, R: RemoteApi>(
    State(state): State<AppState<M, R>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<RequestAccepted>)> {
    let request = parse_with_correlation_id(&body)?;
    let queue = &state.orchestrator.config().channels.request_queue;

    let message_id = state
        .orchestrator
        .messaging()
        .send_message(queue, &request.correlation_id, &request)
        .await?;

    info!(
        correlation_id = %request.correlation_id,
        queue = %queue,
        message_id = %message_id,
        "Change request enqueued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RequestAccepted {
            correlation_id: request.correlation_id,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed_bodies() {
        assert!(matches!(
            parse_change_request(b""),
            Err(ApiError::MalformedInput { .. })
        ));
        assert!(matches!(
            parse_change_request(b"{\"correlationID\": \"r1\"}"),
            Err(ApiError::MalformedInput { .. })
        ));
        assert!(matches!(
            parse_change_request(
                br#"{"correlationID":"r1","targetID":"","action":"modify-capacity"}"#
            ),
            Err(ApiError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_parse_accepts_capacity_change_without_parameter() {
        let request = parse_change_request(
            br#"{"correlationID":"r1","targetID":"svc-1","action":"modify-capacity"}"#,
        )
        .unwrap();
        assert_eq!(request.parameter, None);
    }

    #[test]
    fn test_missing_correlation_id_is_generated() {
        let request =
            parse_with_correlation_id(br#"{"targetID":"svc-1","action":"reroute"}"#).unwrap();
        assert!(Uuid::parse_str(&request.correlation_id).is_ok());

        let request = parse_with_correlation_id(
            br#"{"correlationID":"r7","targetID":"svc-1","action":"reroute"}"#,
        )
        .unwrap();
        assert_eq!(request.correlation_id, "r7");

        assert!(parse_with_correlation_id(b"[1, 2]").is_err());
    }

    #[test]
    fn test_parse_accepts_valid_request() {
        let request = parse_change_request(
            br#"{"correlationID":"r1","targetID":"svc-1","action":"modify-capacity","parameter":50}"#,
        )
        .unwrap();
        assert_eq!(request.parameter, Some(50));
    }
}
