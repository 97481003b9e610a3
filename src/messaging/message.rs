//! # Change Messages
//!
//! Message formats carried on the request, pending and result channels.
//!
//! Field names on the wire follow the caller-facing contract
//! (`correlationID`, `targetID`, `externalID`, `errorMessage`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::keys;

/// Kind of change requested against the target resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChangeAction {
    /// Adjust provisioned capacity; `parameter` carries the delta
    ModifyCapacity,
    /// Any other action the remote API understands, passed through verbatim
    Other(String),
}

impl ChangeAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ModifyCapacity => "modify-capacity",
            Self::Other(action) => action.as_str(),
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("action must not be empty".to_string()),
            "modify-capacity" => Ok(Self::ModifyCapacity),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

impl TryFrom<String> for ChangeAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangeAction> for String {
    fn from(action: ChangeAction) -> Self {
        action.as_str().to_string()
    }
}

/// Incoming request to change an externally-managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "targetID")]
    pub target_id: String,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<i64>,
}

impl ChangeRequest {
    pub fn new(
        correlation_id: impl Into<String>,
        target_id: impl Into<String>,
        action: ChangeAction,
        parameter: Option<i64>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            target_id: target_id.into(),
            action,
            parameter,
        }
    }

    /// Structural checks beyond deserialization
    pub fn validate(&self) -> Result<(), String> {
        if self.correlation_id.trim().is_empty() {
            return Err("correlationID must not be empty".to_string());
        }
        if self.target_id.trim().is_empty() {
            return Err("targetID must not be empty".to_string());
        }
        Ok(())
    }
}

/// Tracking record for a change the remote system has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTracking {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    /// Status checks already performed; travels with each re-enqueue
    #[serde(default)]
    pub attempt: u32,
}

impl PendingTracking {
    pub fn new(correlation_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            external_id: external_id.into(),
            attempt: 0,
        }
    }

    /// Successor record after one more pending poll
    pub fn next_attempt(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            external_id: self.external_id.clone(),
            attempt: self.attempt.saturating_add(1),
        }
    }

    /// Key on the pending channel: `Pending:<correlation id>`
    pub fn message_key(&self) -> String {
        keys::pending_key(&self.correlation_id)
    }
}

/// Terminal status of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Completed,
    Failed,
    /// Remote reported a terminal state other than completed/failed
    OtherTerminal,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::OtherTerminal => write!(f, "OTHER_TERMINAL"),
        }
    }
}

/// Final outcome for a correlation ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalResult {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    /// Empty when the change was never accepted by the remote system
    #[serde(rename = "externalID", default)]
    pub external_id: String,
    pub status: ResultStatus,
    #[serde(
        rename = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
    /// Raw remote state when it was reported by the status API
    #[serde(rename = "remoteState", default, skip_serializing_if = "Option::is_none")]
    pub remote_state: Option<String>,
}

impl TerminalResult {
    pub fn completed(
        correlation_id: impl Into<String>,
        external_id: impl Into<String>,
        remote_state: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            external_id: external_id.into(),
            status: ResultStatus::Completed,
            error_message: None,
            remote_state: Some(remote_state.into()),
        }
    }

    pub fn failed(
        correlation_id: impl Into<String>,
        external_id: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            external_id: external_id.into(),
            status: ResultStatus::Failed,
            error_message: Some(error_message.into()),
            remote_state: None,
        }
    }

    pub fn with_status(mut self, status: ResultStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_remote_state(mut self, remote_state: impl Into<String>) -> Self {
        self.remote_state = Some(remote_state.into());
        self
    }

    /// Key on the result channel: `Result:<correlation id>`
    pub fn message_key(&self) -> String {
        keys::result_key(&self.correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_request_wire_format() {
        let request: ChangeRequest = serde_json::from_value(json!({
            "correlationID": "r1",
            "targetID": "svc-1",
            "action": "modify-capacity",
            "parameter": 50
        }))
        .unwrap();

        assert_eq!(request.correlation_id, "r1");
        assert_eq!(request.target_id, "svc-1");
        assert_eq!(request.action, ChangeAction::ModifyCapacity);
        assert_eq!(request.parameter, Some(50));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unknown_action_passes_through() {
        let request: ChangeRequest = serde_json::from_value(json!({
            "correlationID": "r2",
            "targetID": "svc-2",
            "action": "reroute"
        }))
        .unwrap();

        assert_eq!(request.action, ChangeAction::Other("reroute".to_string()));
        assert_eq!(serde_json::to_value(&request).unwrap()["action"], "reroute");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let missing_target = ChangeRequest::new("r1", " ", ChangeAction::ModifyCapacity, Some(1));
        assert!(missing_target.validate().is_err());

        let missing_correlation = ChangeRequest::new("", "svc", ChangeAction::ModifyCapacity, Some(1));
        assert!(missing_correlation
            .validate()
            .unwrap_err()
            .contains("correlationID"));

        // parameter is optional for every action
        let no_parameter = ChangeRequest::new("r1", "svc", ChangeAction::ModifyCapacity, None);
        assert!(no_parameter.validate().is_ok());

        let empty_action = serde_json::from_value::<ChangeRequest>(json!({
            "correlationID": "r1",
            "targetID": "svc",
            "action": ""
        }));
        assert!(empty_action.is_err());
    }

    #[test]
    fn test_pending_tracking_defaults_attempt() {
        let pending: PendingTracking =
            serde_json::from_value(json!({"correlationID": "r1", "externalID": "rec-9"})).unwrap();
        assert_eq!(pending.attempt, 0);
        assert_eq!(pending.message_key(), "Pending:r1");

        let next = pending.next_attempt();
        assert_eq!(next.attempt, 1);
        assert_eq!(next.external_id, "rec-9");

        let saturated = PendingTracking {
            attempt: u32::MAX,
            ..pending
        };
        assert_eq!(saturated.next_attempt().attempt, u32::MAX);
    }

    #[test]
    fn test_terminal_result_wire_format() {
        let result = TerminalResult::completed("r1", "rec-9", "COMPLETED");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["correlationID"], "r1");
        assert_eq!(value["externalID"], "rec-9");
        assert_eq!(value["status"], "COMPLETED");
        assert!(value.get("errorMessage").is_none());
        assert_eq!(result.message_key(), "Result:r1");

        let failed = TerminalResult::failed("r2", "", "Service change failed: 409 - busy");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["errorMessage"], "Service change failed: 409 - busy");

        let other = TerminalResult::completed("r3", "rec-1", "CANCELLED")
            .with_status(ResultStatus::OtherTerminal);
        assert_eq!(serde_json::to_value(&other).unwrap()["status"], "OTHER_TERMINAL");
    }
}
