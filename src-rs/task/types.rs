use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prompt::GenerationRequest;
use crate::result::TaskOutcome;

/// Native queue states as stored in the result backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub worker: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn pending(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            worker: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Moves a non-terminal record to STARTED. Terminal records are left alone.
    pub fn start(&mut self, worker_id: &str) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Started;
        self.worker = Some(worker_id.to_string());
    }

    pub fn finish(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success(prompt) => {
                self.status = TaskStatus::Success;
                self.result = Some(prompt);
            }
            TaskOutcome::Failure(err) => {
                self.status = TaskStatus::Failure;
                self.error = Some(err);
            }
        }
        self.completed_at = Some(Utc::now());
    }
}

/// Queued unit of work as it travels through the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub task_id: String,
    pub request: GenerationRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            request,
            enqueued_at: Utc::now(),
        }
    }
}

/// What callers see when polling a task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success(String),
    Failure(String),
    /// Any other native state, by name.
    Other(String),
}

impl TaskState {
    /// Unknown ids have no record and read as pending.
    pub fn from_record(record: Option<TaskRecord>) -> Self {
        let record = match record {
            Some(record) => record,
            None => return TaskState::Pending,
        };
        match record.status {
            TaskStatus::Pending => TaskState::Pending,
            TaskStatus::Success => TaskState::Success(record.result.unwrap_or_default()),
            TaskStatus::Failure => TaskState::Failure(
                record
                    .error
                    .filter(|err| !err.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            other => TaskState::Other(other.as_str().to_string()),
        }
    }
}
