//! Shared state for the REST entry point.

use std::sync::Arc;

use crate::messaging::MessagingService;
use crate::orchestration::ChangeOrchestrator;
use crate::remote::RemoteApi;

/// Handler state: the running orchestrator and everything it owns
pub struct AppState<M: MessagingService, R: RemoteApi> {
    pub orchestrator: Arc<ChangeOrchestrator<M, R>>,
}

impl<M: MessagingService, R: RemoteApi> AppState<M, R> {
    pub fn new(orchestrator: Arc<ChangeOrchestrator<M, R>>) -> Self {
        Self { orchestrator }
    }
}

impl<M: MessagingService, R: RemoteApi> Clone for AppState<M, R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}
