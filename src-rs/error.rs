use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::llm::ProviderError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Failures talking to the broker or result store.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Broker(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("broker closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures inside a worker while composing a prompt.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("inference request failed: {0}")]
    Inference(#[from] ProviderError),

    #[error("inference returned an empty completion")]
    EmptyCompletion,

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Caller-visible API failures. The body only ever carries a generic message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to start prompt generation task.")]
    Dispatch(#[source] QueueError),

    #[error("Failed to check task status.")]
    StatusLookup(#[source] QueueError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_errors_are_not_prefixed_twice() {
        let err = QueueError::from(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "Connection refused",
        )));
        let shown = err.to_string();
        assert!(shown.contains("Connection refused"));
        assert!(!shown.to_lowercase().contains("broker error"));
    }

    #[test]
    fn timeout_names_the_limit() {
        assert_eq!(
            QueueError::Timeout(Duration::from_millis(200)).to_string(),
            "timed out after 200ms"
        );
    }

    #[test]
    fn api_errors_stay_generic() {
        assert_eq!(
            ApiError::Dispatch(QueueError::Closed).to_string(),
            "Failed to start prompt generation task."
        );
    }
}
