//! # REST Entry Point
//!
//! Optional axum server in front of the orchestrator (`web.enabled`). It
//! shares the orchestrator's remote client and messaging provider and stops
//! on the same shutdown signal as the worker loops.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::{ChangeflowError, Result};
use crate::messaging::MessagingService;
use crate::remote::RemoteApi;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_router<M: MessagingService, R: RemoteApi>(state: AppState<M, R>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check::<M, R>))
        .route(
            "/service-change/recommendation",
            post(handlers::changes::create_recommendation::<M, R>),
        )
        .route(
            "/service-change/requests",
            post(handlers::changes::enqueue_request::<M, R>),
        )
        .with_state(state)
}

/// Serve `router` until the shutdown signal fires
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| ChangeflowError::Web(e.to_string()))
}
