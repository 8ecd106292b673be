use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::broker::{shutdown_requested, TaskBroker};
use super::types::Job;
use crate::error::{ComposeError, QueueError};
use crate::prompt::PromptComposer;
use crate::result::TaskOutcome;

const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(2);
const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(500);

/// Executes queued jobs one at a time. Each job gets a single attempt.
pub struct Worker {
    pub id: String,
    broker: Arc<dyn TaskBroker>,
    composer: PromptComposer,
    poll_wait: Duration,
}

impl Worker {
    pub fn new(id: &str, broker: Arc<dyn TaskBroker>, composer: PromptComposer) -> Self {
        Self {
            id: id.to_string(),
            broker,
            composer,
            poll_wait: DEFAULT_POLL_WAIT,
        }
    }

    pub fn with_poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    /// Pulls jobs until shutdown. A job already popped always runs to completion.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(worker = %self.id, composer = self.composer.name(), "worker started");
        while !shutdown_requested(&shutdown) {
            match self.broker.next_job(self.poll_wait).await {
                Ok(Some(job)) => {
                    if let Err(err) = self.execute(job).await {
                        error!(worker = %self.id, error = %err, "failed to record task result");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(worker = %self.id, error = %err, "could not fetch next job");
                    tokio::time::sleep(self.poll_wait).await;
                }
            }
        }
        info!(worker = %self.id, "worker stopped");
    }

    pub async fn execute(&self, job: Job) -> Result<TaskOutcome, QueueError> {
        let task_id = job.task_id;
        info!(task_id = %task_id, worker = %self.id, "task received");
        if let Err(err) = self.broker.mark_started(&task_id, &self.id).await {
            // The job is already off the queue; leave a terminal record behind.
            let outcome = TaskOutcome::Failure(format!("could not start task: {}", err));
            if let Err(store_err) = self.broker.store_outcome(&task_id, outcome).await {
                error!(task_id = %task_id, error = %store_err, "could not record start failure");
            }
            return Err(err);
        }

        let composer = self.composer.clone();
        let request = job.request;
        let handle = tokio::spawn(async move { composer.compose(&request).await });
        let outcome = match handle.await {
            Ok(Ok(prompt)) => {
                info!(task_id = %task_id, "task succeeded");
                TaskOutcome::Success(prompt)
            }
            Ok(Err(err)) => {
                warn!(task_id = %task_id, error = %err, "task failed");
                TaskOutcome::Failure(err.to_string())
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "cancelled".to_string()
                };
                let err = ComposeError::Panicked(reason);
                error!(task_id = %task_id, error = %err, "task aborted");
                TaskOutcome::Failure(err.to_string())
            }
        };

        self.broker.store_outcome(&task_id, outcome.clone()).await?;
        Ok(outcome)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "unknown panic".to_string()
}

/// Spawns `concurrency` job loops plus one ping responder named `node`. The
/// responder re-subscribes whenever its subscription drops.
pub fn spawn_workers(
    node: &str,
    broker: Arc<dyn TaskBroker>,
    composer: PromptComposer,
    concurrency: usize,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(concurrency + 1);

    {
        let broker = broker.clone();
        let node = node.to_string();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            while !shutdown_requested(&shutdown) {
                match broker.serve_pings(&node, shutdown.clone()).await {
                    Ok(()) => break,
                    Err(err) => {
                        warn!(worker = %node, error = %err, "ping responder dropped, resubscribing");
                        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                    }
                }
            }
        }));
    }

    for idx in 1..=concurrency.max(1) {
        let worker = Worker::new(&format!("{}-{}", node, idx), broker.clone(), composer.clone());
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }

    handles
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{CompletionRequest, LLMResponse, ProviderAdapter, ProviderError};
    use crate::prompt::GenerationRequest;
    use crate::task::store::MemoryBroker;
    use crate::task::types::{TaskRecord, TaskState, TaskStatus};

    struct Failing;

    #[async_trait]
    impl ProviderAdapter for Failing {
        async fn complete(&self, _request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
            Err(ProviderError::new("network_error", "connection refused"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ProviderAdapter for Panicking {
        async fn complete(&self, _request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
            panic!("provider exploded");
        }
    }

    /// Wraps a memory broker, failing `mark_started` always and `serve_pings` once.
    struct Faulty {
        inner: Arc<MemoryBroker>,
        fail_start: bool,
        ping_failed: AtomicBool,
    }

    impl Faulty {
        fn new(inner: Arc<MemoryBroker>, fail_start: bool) -> Self {
            Self {
                inner,
                fail_start,
                ping_failed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl TaskBroker for Faulty {
        async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
            self.inner.enqueue(job).await
        }
        async fn next_job(&self, wait: Duration) -> Result<Option<Job>, QueueError> {
            self.inner.next_job(wait).await
        }
        async fn mark_started(&self, task_id: &str, worker_id: &str) -> Result<(), QueueError> {
            if self.fail_start {
                return Err(QueueError::Closed);
            }
            self.inner.mark_started(task_id, worker_id).await
        }
        async fn store_outcome(&self, task_id: &str, outcome: TaskOutcome) -> Result<(), QueueError> {
            self.inner.store_outcome(task_id, outcome).await
        }
        async fn task_record(&self, task_id: &str) -> Result<Option<TaskRecord>, QueueError> {
            self.inner.task_record(task_id).await
        }
        async fn ping(&self) -> Result<bool, QueueError> {
            self.inner.ping().await
        }
        async fn ping_workers(&self, timeout: Duration) -> Result<Vec<String>, QueueError> {
            self.inner.ping_workers(timeout).await
        }
        async fn serve_pings(
            &self,
            worker_id: &str,
            shutdown: watch::Receiver<bool>,
        ) -> Result<(), QueueError> {
            if !self.ping_failed.swap(true, Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }
            self.inner.serve_pings(worker_id, shutdown).await
        }
    }

    fn job() -> Job {
        Job::new(GenerationRequest {
            objective: "Build X".to_string(),
            tech_stack: "Go".to_string(),
            git_tool: "github".to_string(),
            user_info: "Alice".to_string(),
        })
    }

    async fn state_of(broker: &MemoryBroker, id: &str) -> TaskState {
        TaskState::from_record(broker.task_record(id).await.unwrap())
    }

    #[tokio::test]
    async fn template_job_succeeds() {
        let broker = Arc::new(MemoryBroker::default());
        let worker = Worker::new("w", broker.clone(), PromptComposer::Template);
        let job = job();
        let id = job.task_id.clone();

        let outcome = worker.execute(job).await.unwrap();
        assert!(outcome.is_success());
        match state_of(&broker, &id).await {
            TaskState::Success(text) => {
                for needle in ["Build X", "Go", "github", "Alice", "best practices."] {
                    assert!(text.contains(needle), "missing {needle}");
                }
            }
            other => panic!("unexpected state {other:?}"),
        }
        let record = broker.task_record(&id).await.unwrap().unwrap();
        assert_eq!(record.worker.as_deref(), Some("w"));
    }

    #[tokio::test]
    async fn provider_error_becomes_failure() {
        let broker = Arc::new(MemoryBroker::default());
        let composer = PromptComposer::Inference {
            provider: Arc::new(Failing),
            model: None,
        };
        let worker = Worker::new("w", broker.clone(), composer);
        let job = job();
        let id = job.task_id.clone();

        worker.execute(job).await.unwrap();
        match state_of(&broker, &id).await {
            TaskState::Failure(detail) => assert!(detail.contains("connection refused")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_is_captured_as_failure() {
        let broker = Arc::new(MemoryBroker::default());
        let composer = PromptComposer::Inference {
            provider: Arc::new(Panicking),
            model: None,
        };
        let worker = Worker::new("w", broker.clone(), composer);
        let job = job();
        let id = job.task_id.clone();

        worker.execute(job).await.unwrap();
        match state_of(&broker, &id).await {
            TaskState::Failure(detail) => assert!(detail.contains("provider exploded")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_drains_queue_until_shutdown() {
        let broker = Arc::new(MemoryBroker::default());
        let job = job();
        let id = job.task_id.clone();
        broker.enqueue(job).await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Worker::new("w", broker.clone(), PromptComposer::Template)
            .with_poll_wait(Duration::from_millis(20));
        let handle = tokio::spawn(async move { worker.run(stop_rx).await });

        for _ in 0..100 {
            let record = broker.task_record(&id).await.unwrap().unwrap();
            if record.status == TaskStatus::Success {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(state_of(&broker, &id).await, TaskState::Success(_)));

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(broker.queued(), 0);
    }

    #[tokio::test]
    async fn start_failure_leaves_terminal_record() {
        let inner = Arc::new(MemoryBroker::default());
        let worker = Worker::new("w", Arc::new(Faulty::new(inner.clone(), true)), PromptComposer::Template);
        let job = job();
        let id = job.task_id.clone();
        inner.enqueue(job.clone()).await.unwrap();

        assert!(worker.execute(job).await.is_err());
        match state_of(&inner, &id).await {
            TaskState::Failure(detail) => assert!(detail.contains("could not start task")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_responder_resubscribes_after_drop() {
        let inner = Arc::new(MemoryBroker::default());
        let broker: Arc<dyn TaskBroker> = Arc::new(Faulty::new(inner.clone(), false));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = spawn_workers("node-a", broker.clone(), PromptComposer::Template, 1, stop_rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while inner.ping_listeners() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("responder never came back");

        let replies = broker.ping_workers(Duration::from_secs(1)).await.unwrap();
        assert_eq!(replies, vec!["node-a".to_string()]);

        stop_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
