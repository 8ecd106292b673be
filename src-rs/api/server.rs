use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{
    handle_health, handle_infer, handle_metadata, handle_submit, handle_task_status, AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-prompt", post(handle_submit))
        .route("/v1/infer", post(handle_infer))
        .route("/task-status/:task_id", get(handle_task_status))
        .route("/v1/metadata", get(handle_metadata))
        .route("/v1/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct PromptServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl PromptServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("listening on http://{}", self.addr);
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}
