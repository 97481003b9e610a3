//! # Signed Client
//!
//! Authenticated HTTP client for the remote change API. One instance is built
//! at startup and shared by both workers; the underlying connection pool keeps
//! up to `max_idle_connections` idle connections per host.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::errors::{RemoteCallError, RemoteOperation};
use super::signing::SignedEnvelope;
use super::types::{
    InitiatedChange, RecommendationRequest, RecommendationResponse, RecommendationState,
    RemoteErrorEnvelope, StatusReport,
};
use crate::config::{ConfigResult, ConfigurationError, RemoteApiConfig};
use crate::constants::remote::RECOMMENDATION_PATH;
use crate::logging::log_remote_call;
use crate::messaging::ChangeRequest;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Operations the workers need from the remote change API
#[async_trait]
pub trait RemoteApi: Send + Sync + 'static {
    /// Submit a change; expects `201 Created` carrying the external ID
    async fn initiate_change(
        &self,
        request: &ChangeRequest,
    ) -> Result<InitiatedChange, RemoteCallError>;

    /// Fetch the current remote state of an accepted change; expects `200 OK`
    async fn check_status(&self, external_id: &str) -> Result<StatusReport, RemoteCallError>;
}

/// reqwest-backed [`RemoteApi`] signing every request with the shared secret
#[derive(Debug, Clone)]
pub struct SignedClient {
    http: reqwest::Client,
    config: RemoteApiConfig,
}

impl SignedClient {
    pub fn new(config: RemoteApiConfig) -> ConfigResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.idle_connection_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ConfigurationError::invalid_value(
                    "remote",
                    config.server.clone(),
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        // Reject header names that reqwest would refuse on every call
        for header in [&config.app_id_header, &config.signature_header] {
            HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
                ConfigurationError::invalid_value(header.as_str(), header.clone(), e.to_string())
            })?;
        }

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server.trim_end_matches('/'), path)
    }

    fn signed_headers(
        &self,
        operation: RemoteOperation,
        path: &str,
        body: &[u8],
    ) -> Result<HeaderMap, RemoteCallError> {
        let envelope = SignedEnvelope::sign(&self.config.shared_secret, path, body);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let app_id_name = HeaderName::from_bytes(self.config.app_id_header.as_bytes())
            .map_err(|e| RemoteCallError::transport(operation, e.to_string()))?;
        let app_id_value = HeaderValue::from_str(&self.config.app_id)
            .map_err(|e| RemoteCallError::transport(operation, e.to_string()))?;
        headers.insert(app_id_name, app_id_value);

        let signature_name = HeaderName::from_bytes(self.config.signature_header.as_bytes())
            .map_err(|e| RemoteCallError::transport(operation, e.to_string()))?;
        let signature_value = HeaderValue::from_str(&envelope.signature)
            .map_err(|e| RemoteCallError::transport(operation, e.to_string()))?;
        headers.insert(signature_name, signature_value);

        Ok(headers)
    }

    /// Issue one signed call and return the status and raw body
    async fn execute(
        &self,
        operation: RemoteOperation,
        method: Method,
        path: &str,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Vec<u8>), RemoteCallError> {
        let headers = self.signed_headers(operation, path, &body)?;
        let started = Instant::now();

        let response = self
            .http
            .request(method.clone(), self.url(path))
            .headers(headers)
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let elapsed = started.elapsed().as_millis() as u64;
                log_remote_call(method.as_str(), path, None, elapsed, "transport_error");
                return Err(if e.is_timeout() {
                    RemoteCallError::timeout(operation, e.to_string())
                } else {
                    RemoteCallError::transport(operation, e.to_string())
                });
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            RemoteCallError::protocol(
                operation,
                Some(status.as_u16()),
                format!("unable to read response body: {e}"),
            )
        })?;

        let elapsed = started.elapsed().as_millis() as u64;
        log_remote_call(
            method.as_str(),
            path,
            Some(status.as_u16()),
            elapsed,
            if status.is_success() { "ok" } else { "error" },
        );

        Ok((status, bytes.to_vec()))
    }

    /// Decode a success body or turn an error body into a rejection
    fn interpret<T: DeserializeOwned>(
        operation: RemoteOperation,
        expected: StatusCode,
        status: StatusCode,
        body: &[u8],
    ) -> Result<T, RemoteCallError> {
        if status != expected {
            let envelope: RemoteErrorEnvelope = serde_json::from_slice(body).map_err(|e| {
                RemoteCallError::protocol(operation, Some(status.as_u16()), e.to_string())
            })?;
            return Err(RemoteCallError::rejected(
                operation,
                status.as_u16(),
                envelope.code,
                envelope.message,
            ));
        }

        serde_json::from_slice(body)
            .map_err(|e| RemoteCallError::protocol(operation, Some(status.as_u16()), e.to_string()))
    }
}

/// Status path for `external_id`, percent-encoded as a single path segment.
///
/// The same string is signed and requested, so an ID containing `/`, `?` or
/// `#` cannot change the resource being addressed.
pub fn status_path(external_id: &str) -> String {
    let fallback = || format!("{RECOMMENDATION_PATH}/{external_id}");
    let Ok(mut url) = reqwest::Url::parse("http://remote.invalid/") else {
        return fallback();
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments
                .pop_if_empty()
                .push(RECOMMENDATION_PATH.trim_start_matches('/'))
                .push(external_id);
        }
        Err(()) => return fallback(),
    }
    url.path().to_string()
}

#[async_trait]
impl RemoteApi for SignedClient {
    async fn initiate_change(
        &self,
        request: &ChangeRequest,
    ) -> Result<InitiatedChange, RemoteCallError> {
        let operation = RemoteOperation::InitiateChange;
        let body = serde_json::to_vec(&RecommendationRequest::from(request))
            .map_err(|e| RemoteCallError::protocol(operation, None, e.to_string()))?;

        debug!(
            correlation_id = %request.correlation_id,
            target_id = %request.target_id,
            action = %request.action,
            "Initiating remote change"
        );

        let (status, bytes) = self
            .execute(operation, Method::POST, RECOMMENDATION_PATH, body)
            .await?;
        let response: RecommendationResponse =
            Self::interpret(operation, StatusCode::CREATED, status, &bytes)?;

        Ok(InitiatedChange {
            external_id: response.recommendation_id,
            status_code: status.as_u16(),
        })
    }

    async fn check_status(&self, external_id: &str) -> Result<StatusReport, RemoteCallError> {
        let operation = RemoteOperation::CheckStatus;
        let path = status_path(external_id);

        let (status, bytes) = self
            .execute(operation, Method::GET, &path, Vec::new())
            .await?;
        let response: RecommendationState =
            Self::interpret(operation, StatusCode::OK, status, &bytes)?;

        Ok(StatusReport {
            state: response.state,
            status_code: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ChangeAction;
    use crate::remote::errors::ErrorClass;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SignedClient {
        SignedClient::new(RemoteApiConfig::new(server.uri(), "app-1", "s3cret")).unwrap()
    }

    fn capacity_request() -> ChangeRequest {
        ChangeRequest::new("r1", "svc-1", ChangeAction::ModifyCapacity, Some(50))
    }

    #[tokio::test]
    async fn test_initiate_change_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/recommendation"))
            .and(header("x-colt-app-id", "app-1"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(header_exists("x-colt-app-sig"))
            .and(body_json(json!({
                "service_id": "svc-1",
                "action": "modify-capacity",
                "bandwidth_change": 50
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"recommendation_id": "rec-9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let accepted = client_for(&server)
            .initiate_change(&capacity_request())
            .await
            .unwrap();
        assert_eq!(accepted.external_id, "rec-9");
        assert_eq!(accepted.status_code, 201);
    }

    #[tokio::test]
    async fn test_signature_header_matches_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"recommendation_id": "rec-1"})),
            )
            .mount(&server)
            .await;

        client_for(&server)
            .initiate_change(&capacity_request())
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let request = &received[0];
        let sent_signature = request
            .headers
            .get("x-colt-app-sig")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let expected = SignedEnvelope::sign("s3cret", "/recommendation", &request.body);
        // Tolerate the hour rolling over between send and check
        let previous_hour = SignedEnvelope::sign_at(
            "s3cret",
            "/recommendation",
            &request.body,
            chrono::Utc::now() - chrono::Duration::hours(1),
        );
        assert!(sent_signature == expected.signature || sent_signature == previous_hour.signature);
    }

    #[tokio::test]
    async fn test_initiate_change_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"code": 409, "message": "busy"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .initiate_change(&capacity_request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Service change failed: 409 - busy");
        assert_eq!(err.kind(), ErrorClass::RemoteRejection);
        assert_eq!(err.status_code(), Some(409));
    }

    #[tokio::test]
    async fn test_success_status_other_than_created_is_not_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"recommendation_id": "rec-1"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .initiate_change(&capacity_request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorClass::Protocol);
    }

    #[tokio::test]
    async fn test_initiate_change_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .initiate_change(&capacity_request())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteCallError::Protocol { status: Some(201), .. }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on port 1
        let client =
            SignedClient::new(RemoteApiConfig::new("http://127.0.0.1:1", "app-1", "s3cret"))
                .unwrap();
        let err = client.initiate_change(&capacity_request()).await.unwrap_err();
        assert!(matches!(err, RemoteCallError::Transport { .. }));
        assert!(err.to_string().starts_with("Unable to issue service change"));
    }

    #[test]
    fn test_status_path_encodes_external_id() {
        assert_eq!(status_path("rec-9"), "/recommendation/rec-9");
        assert_eq!(status_path("rec/9?x#y"), "/recommendation/rec%2F9%3Fx%23y");
    }

    #[tokio::test]
    async fn test_check_status_signs_encoded_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendation/rec%2F9%3Fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "COMPLETED"})))
            .expect(1)
            .mount(&server)
            .await;

        let report = client_for(&server).check_status("rec/9?x").await.unwrap();
        assert_eq!(report.state, "COMPLETED");

        let received = server.received_requests().await.unwrap();
        let sent_signature = received[0]
            .headers
            .get("x-colt-app-sig")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let envelope = SignedEnvelope::sign("s3cret", "/recommendation/rec%2F9%3Fx", &[]);
        assert_eq!(sent_signature, envelope.signature);
        assert!(received[0].url.query().is_none());
    }

    #[tokio::test]
    async fn test_check_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendation/rec-9"))
            .and(header("x-colt-app-id", "app-1"))
            .and(header_exists("x-colt-app-sig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "PENDING"})))
            .mount(&server)
            .await;

        let report = client_for(&server).check_status("rec-9").await.unwrap();
        assert_eq!(report.state, "PENDING");
        assert_eq!(report.status_code, 200);

        let received = server.received_requests().await.unwrap();
        assert!(received[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_check_status_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 404, "message": "no such recommendation"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).check_status("missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Service change status check failed: 404 - no such recommendation"
        );
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let mut config = RemoteApiConfig::new("http://localhost", "app", "secret");
        config.signature_header = "bad header".to_string();
        assert!(SignedClient::new(config).is_err());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client =
            SignedClient::new(RemoteApiConfig::new("http://remote.test/api/", "a", "s")).unwrap();
        assert_eq!(
            client.url("/recommendation"),
            "http://remote.test/api/recommendation"
        );
    }
}
