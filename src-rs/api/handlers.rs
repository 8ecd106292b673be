use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::prompt::GenerationRequest;
use crate::task::{within, TaskBroker, TaskRunner, TaskState};

pub const SERVICE_NAME: &str = "MCP Prompt Generator API";
pub const SERVICE_DESCRIPTION: &str = "API for generating custom project prompts using an async task queue.";
pub const SERVICE_VERSION: &str = "1.0.0";
pub const SERVICE_MAINTAINER: &str = "Austin Noronha";
pub const SERVICE_CAPABILITIES: [&str; 2] = ["prompt-generation", "async-tasks"];

// Room for a broker's own worker-ping deadline to fire first.
const WORKER_PING_GRACE: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct AppState {
    pub runner: TaskRunner,
    pub worker_ping_timeout: Duration,
}

impl AppState {
    pub fn new(runner: TaskRunner, worker_ping_timeout: Duration) -> Self {
        Self {
            runner,
            worker_ping_timeout,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskState> for StatusResponse {
    fn from(state: TaskState) -> Self {
        let (status, result, error) = match state {
            TaskState::Pending => ("pending".to_string(), None, None),
            TaskState::Success(prompt) => ("success".to_string(), Some(prompt), None),
            TaskState::Failure(err) => ("failure".to_string(), None, Some(err)),
            TaskState::Other(native) => (native.to_lowercase(), None, None),
        };
        Self {
            status,
            result,
            error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub maintainer: Option<String>,
}

impl ServiceMetadata {
    pub fn current() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            description: SERVICE_DESCRIPTION.to_string(),
            version: SERVICE_VERSION.to_string(),
            capabilities: SERVICE_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            maintainer: Some(SERVICE_MAINTAINER.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub detail: Option<String>,
}

pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    debug!(objective = %req.objective, tech_stack = %req.tech_stack, "prompt generation requested");
    let task_id = state.runner.enqueue(req).await.map_err(|err| {
        error!(error = %err, "failed to start prompt generation task");
        ApiError::Dispatch(err)
    })?;
    info!(task_id = %task_id, "prompt generation task started");
    Ok(Json(SubmitResponse {
        task_id,
        status: "processing".to_string(),
    }))
}

/// Same contract as `handle_submit`, served under the `/v1/infer` name.
pub async fn handle_infer(
    state: State<AppState>,
    req: Json<GenerationRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    handle_submit(state, req).await
}

pub async fn handle_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let task_state = state.runner.get_result(&task_id).await.map_err(|err| {
        error!(task_id = %task_id, error = %err, "error checking task status");
        ApiError::StatusLookup(err)
    })?;
    match &task_state {
        TaskState::Failure(err) => warn!(task_id = %task_id, error = %err, "task failed"),
        other => debug!(task_id = %task_id, state = ?other, "task status checked"),
    }
    Ok(Json(task_state.into()))
}

pub async fn handle_metadata() -> Json<ServiceMetadata> {
    Json(ServiceMetadata::current())
}

pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(check_health(state.runner.broker().as_ref(), state.worker_ping_timeout).await)
}

/// Runs both liveness checks, each bounded by `ping_timeout`; every failure is
/// folded into `detail`.
pub async fn check_health(broker: &dyn TaskBroker, ping_timeout: Duration) -> HealthResponse {
    let (broker_check, worker_check) = tokio::join!(
        within(ping_timeout, broker.ping()),
        within(ping_timeout + WORKER_PING_GRACE, broker.ping_workers(ping_timeout)),
    );

    let mut details = Vec::new();
    match broker_check {
        Ok(true) => {}
        Ok(false) => details.push("Broker ping failed".to_string()),
        Err(err) => details.push(format!("Broker error: {}", err)),
    }
    match worker_check {
        Ok(replies) if !replies.is_empty() => {}
        Ok(_) => details.push("No workers responded to ping".to_string()),
        Err(err) => details.push(format!("Worker error: {}", err)),
    }

    if details.is_empty() {
        HealthResponse {
            status: "ok".to_string(),
            detail: None,
        }
    } else {
        let detail = details.join(", ");
        warn!(%detail, "health check degraded");
        HealthResponse {
            status: "degraded".to_string(),
            detail: Some(detail),
        }
    }
}
