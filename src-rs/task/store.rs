use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::time::Instant;

use super::broker::{shutdown_requested, TaskBroker};
use super::types::{Job, TaskRecord};
use crate::error::QueueError;
use crate::result::TaskOutcome;

const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(86_400);

#[derive(Clone)]
struct PingRequest {
    reply: mpsc::Sender<String>,
}

struct StoredRecord {
    record: TaskRecord,
    expires_at: Instant,
}

/// In-process broker: a FIFO job queue, a record map, and a broadcast ping channel.
///
/// Records expire `result_ttl` after their last write, the same policy the Redis
/// broker gets from `SET EX`.
pub struct MemoryBroker {
    tasks: RwLock<HashMap<String, StoredRecord>>,
    queue: Mutex<VecDeque<Job>>,
    ready: Notify,
    pings: broadcast::Sender<PingRequest>,
    result_ttl: Duration,
}

impl MemoryBroker {
    pub fn new(result_ttl: Duration) -> Self {
        let (pings, _) = broadcast::channel(16);
        Self {
            tasks: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            pings,
            result_ttl,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Number of workers currently answering pings.
    pub fn ping_listeners(&self) -> usize {
        self.pings.receiver_count()
    }

    fn pop(&self) -> Result<Option<Job>, QueueError> {
        let mut queue = self.queue.lock().map_err(|_| QueueError::Closed)?;
        Ok(queue.pop_front())
    }

    /// Number of records still held, expired ones included until the next prune.
    pub fn stored(&self) -> usize {
        self.tasks.read().map(|map| map.len()).unwrap_or(0)
    }

    fn with_record<F>(&self, task_id: &str, update: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let now = Instant::now();
        let mut map = self.tasks.write().map_err(|_| QueueError::Closed)?;
        prune_expired(&mut map, now);
        let stored = map
            .entry(task_id.to_string())
            .or_insert_with(|| StoredRecord {
                record: TaskRecord::pending(task_id),
                expires_at: now,
            });
        update(&mut stored.record);
        stored.expires_at = now + self.result_ttl;
        Ok(())
    }
}

fn prune_expired(map: &mut HashMap<String, StoredRecord>, now: Instant) {
    map.retain(|_, stored| stored.expires_at > now);
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_TTL)
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        {
            let now = Instant::now();
            let mut map = self.tasks.write().map_err(|_| QueueError::Closed)?;
            prune_expired(&mut map, now);
            map.insert(
                job.task_id.clone(),
                StoredRecord {
                    record: TaskRecord::pending(&job.task_id),
                    expires_at: now + self.result_ttl,
                },
            );
        }
        self.queue.lock().map_err(|_| QueueError::Closed)?.push_back(job);
        self.ready.notify_one();
        Ok(())
    }

    async fn next_job(&self, wait: Duration) -> Result<Option<Job>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(job) = self.pop()? {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if tokio::time::timeout(deadline - now, self.ready.notified())
                .await
                .is_err()
            {
                return self.pop();
            }
        }
    }

    async fn mark_started(&self, task_id: &str, worker_id: &str) -> Result<(), QueueError> {
        self.with_record(task_id, |record| record.start(worker_id))
    }

    async fn store_outcome(&self, task_id: &str, outcome: TaskOutcome) -> Result<(), QueueError> {
        self.with_record(task_id, |record| record.finish(outcome))
    }

    async fn task_record(&self, task_id: &str) -> Result<Option<TaskRecord>, QueueError> {
        let mut map = self.tasks.write().map_err(|_| QueueError::Closed)?;
        prune_expired(&mut map, Instant::now());
        Ok(map.get(task_id).map(|stored| stored.record.clone()))
    }

    async fn ping(&self) -> Result<bool, QueueError> {
        Ok(true)
    }

    async fn ping_workers(&self, timeout: Duration) -> Result<Vec<String>, QueueError> {
        let expected = self.pings.receiver_count();
        if expected == 0 {
            return Ok(Vec::new());
        }
        let (reply, mut replies_rx) = mpsc::channel(expected);
        if self.pings.send(PingRequest { reply }).is_err() {
            return Ok(Vec::new());
        }

        let mut replies = Vec::with_capacity(expected);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        while replies.len() < expected {
            tokio::select! {
                _ = &mut deadline => break,
                msg = replies_rx.recv() => match msg {
                    Some(worker_id) => replies.push(worker_id),
                    None => break,
                },
            }
        }
        Ok(replies)
    }

    async fn serve_pings(
        &self,
        worker_id: &str,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        let mut requests = self.pings.subscribe();
        loop {
            if shutdown_requested(&shutdown) {
                return Ok(());
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                msg = requests.recv() => match msg {
                    Ok(req) => {
                        let _ = req.reply.send(worker_id.to_string()).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Err(QueueError::Closed),
                },
            }
        }
    }
}
