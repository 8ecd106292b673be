use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::types::{Job, TaskRecord};
use crate::error::QueueError;
use crate::result::TaskOutcome;

/// Queue and result store shared by the API and the workers.
///
/// `enqueue` records the task as PENDING before the job becomes visible to workers.
/// Records are only mutated by the worker that popped the job.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    /// Pops the next job, waiting up to `wait`. `None` when nothing arrived.
    async fn next_job(&self, wait: Duration) -> Result<Option<Job>, QueueError>;

    async fn mark_started(&self, task_id: &str, worker_id: &str) -> Result<(), QueueError>;

    async fn store_outcome(&self, task_id: &str, outcome: TaskOutcome) -> Result<(), QueueError>;

    /// `None` for ids the backend has never seen (or already evicted).
    async fn task_record(&self, task_id: &str) -> Result<Option<TaskRecord>, QueueError>;

    /// Liveness of the broker connection itself.
    async fn ping(&self) -> Result<bool, QueueError>;

    /// Broadcasts a control ping and returns the ids of workers that replied within `timeout`.
    async fn ping_workers(&self, timeout: Duration) -> Result<Vec<String>, QueueError>;

    /// Answers control pings as `worker_id` until `shutdown` flips to true.
    async fn serve_pings(
        &self,
        worker_id: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError>;
}

pub(crate) fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Runs `fut` for at most `limit`; an overrun becomes `QueueError::Timeout`.
pub(crate) async fn within<T, F>(limit: Duration, fut: F) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, QueueError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| QueueError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn within_passes_through_fast_results() {
        let value = within(Duration::from_secs(1), async { Ok::<_, QueueError>(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn within_cuts_off_stalled_calls() {
        let stalled = within(Duration::from_millis(20), async {
            std::future::pending::<Result<(), QueueError>>().await
        })
        .await;
        assert!(matches!(stalled, Err(QueueError::Timeout(limit)) if limit == Duration::from_millis(20)));
    }
}
