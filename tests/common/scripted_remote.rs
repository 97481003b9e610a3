//! Scripted stand-in for the remote change API.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use changeflow_core::messaging::ChangeRequest;
use changeflow_core::remote::{InitiatedChange, RemoteApi, RemoteCallError, StatusReport};

type Outcome = Result<String, RemoteCallError>;

/// Initiation outcomes keyed by target ID, status sequences keyed by external
/// ID. An exhausted status sequence keeps answering `PENDING`.
#[derive(Default)]
pub struct ScriptedRemote {
    initiations: Mutex<HashMap<String, Outcome>>,
    statuses: Mutex<HashMap<String, VecDeque<Outcome>>>,
    status_calls: Mutex<Vec<String>>,
    initiation_calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn accept(&self, target_id: &str, external_id: &str) {
        self.initiations
            .lock()
            .await
            .insert(target_id.to_string(), Ok(external_id.to_string()));
    }

    pub async fn reject(&self, target_id: &str, error: RemoteCallError) {
        self.initiations
            .lock()
            .await
            .insert(target_id.to_string(), Err(error));
    }

    pub async fn script_states(&self, external_id: &str, states: &[&str]) {
        self.statuses.lock().await.insert(
            external_id.to_string(),
            states.iter().map(|s| Ok(s.to_string())).collect(),
        );
    }

    pub async fn script_failure(&self, external_id: &str, error: RemoteCallError) {
        self.statuses
            .lock()
            .await
            .insert(external_id.to_string(), VecDeque::from([Err(error)]));
    }

    pub async fn status_calls_for(&self, external_id: &str) -> usize {
        self.status_calls
            .lock()
            .await
            .iter()
            .filter(|id| id.as_str() == external_id)
            .count()
    }

    pub async fn initiation_count(&self) -> usize {
        self.initiation_calls.lock().await.len()
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn initiate_change(
        &self,
        request: &ChangeRequest,
    ) -> Result<InitiatedChange, RemoteCallError> {
        self.initiation_calls
            .lock()
            .await
            .push(request.correlation_id.clone());

        let outcome = self
            .initiations
            .lock()
            .await
            .get(&request.target_id)
            .cloned()
            .unwrap_or_else(|| Ok(format!("rec-{}", request.correlation_id)));

        outcome.map(|external_id| InitiatedChange {
            external_id,
            status_code: 201,
        })
    }

    async fn check_status(&self, external_id: &str) -> Result<StatusReport, RemoteCallError> {
        self.status_calls.lock().await.push(external_id.to_string());

        let next = self
            .statuses
            .lock()
            .await
            .get_mut(external_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok("PENDING".to_string()));

        next.map(|state| StatusReport {
            state,
            status_code: 200,
        })
    }
}
