use std::sync::Arc;

use tracing::debug;

use super::broker::TaskBroker;
use super::types::{Job, TaskState};
use crate::error::QueueError;
use crate::prompt::GenerationRequest;

/// Submits generation requests and reads their state back. No retries, no dedup.
#[derive(Clone)]
pub struct TaskRunner {
    broker: Arc<dyn TaskBroker>,
}

impl TaskRunner {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<dyn TaskBroker> {
        &self.broker
    }

    pub async fn enqueue(&self, request: GenerationRequest) -> Result<String, QueueError> {
        let job = Job::new(request);
        let task_id = job.task_id.clone();
        self.broker.enqueue(job).await?;
        debug!(task_id = %task_id, "job enqueued");
        Ok(task_id)
    }

    pub async fn get_result(&self, task_id: &str) -> Result<TaskState, QueueError> {
        let record = self.broker.task_record(task_id).await?;
        Ok(TaskState::from_record(record))
    }
}
