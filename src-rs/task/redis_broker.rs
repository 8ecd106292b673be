use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use tokio::sync::{watch, OnceCell};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::broker::{shutdown_requested, TaskBroker};
use super::types::{Job, TaskRecord};
use crate::error::QueueError;
use crate::result::TaskOutcome;

const QUEUE_KEY: &str = "prompt:queue";
const TASK_KEY_PREFIX: &str = "prompt:task:";
const CONTROL_CHANNEL: &str = "prompt:control";
const REPLY_KEY_PREFIX: &str = "prompt:control:reply:";
const REPLY_TTL_SECS: u64 = 10;
const CONNECT_BACKOFF_BASE: u64 = 2;
const CONNECT_BACKOFF_FACTOR_MS: u64 = 100;
const CONNECT_RETRIES: usize = 1;
// Redis reads a blocking timeout of 0 as "wait forever".
const MIN_BLOCK: Duration = Duration::from_millis(1);
// Lets a BLPOP that ends exactly at the ping deadline hand back its reply.
const PING_GRACE: Duration = Duration::from_millis(100);

/// Redis-backed broker. Jobs live in a list, records as JSON strings with a TTL,
/// worker pings go over pub/sub with replies collected on a per-ping list.
pub struct RedisBroker {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    blocking: IdleConnections<MultiplexedConnection>,
    result_ttl_secs: u64,
}

/// Connections reserved for blocking pops. A connection is checked back in only
/// after a clean reply; one that errored or was abandoned mid-command is dropped.
struct IdleConnections<C> {
    idle: Mutex<Vec<C>>,
}

impl<C> IdleConnections<C> {
    fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> Option<C> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    fn checkin(&self, conn: C) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

impl RedisBroker {
    /// Validates the URL only; the connection is opened on first use so the API can
    /// start (and report degraded health) while Redis is down.
    pub fn new(url: &str, result_ttl_secs: u64) -> Result<Self, QueueError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: OnceCell::new(),
            blocking: IdleConnections::new(),
            result_ttl_secs,
        })
    }

    async fn conn(&self) -> Result<ConnectionManager, QueueError> {
        let conn = self
            .conn
            .get_or_try_init(|| {
                ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    CONNECT_BACKOFF_BASE,
                    CONNECT_BACKOFF_FACTOR_MS,
                    CONNECT_RETRIES,
                )
            })
            .await?;
        Ok(conn.clone())
    }

    /// A blocking pop holds its connection, so it never shares the manager's.
    async fn blocking_conn(&self) -> Result<MultiplexedConnection, QueueError> {
        match self.blocking.checkout() {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }

    async fn save(&self, record: &TaskRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(task_key(&record.id))
            .arg(payload)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn load_or_pending(&self, task_id: &str) -> Result<TaskRecord, QueueError> {
        Ok(self
            .task_record(task_id)
            .await?
            .unwrap_or_else(|| TaskRecord::pending(task_id)))
    }

    /// Publishes one ping and pops replies into `replies` until every subscriber
    /// answered or `deadline` passes.
    async fn collect_ping_replies(
        &self,
        deadline: Instant,
        replies: &mut Vec<String>,
    ) -> Result<(), QueueError> {
        let reply_key = format!("{}{}", REPLY_KEY_PREFIX, Uuid::new_v4());
        let mut conn = self.blocking_conn().await?;
        let listeners: usize = redis::cmd("PUBLISH")
            .arg(CONTROL_CHANNEL)
            .arg(&reply_key)
            .query_async(&mut conn)
            .await?;
        debug!(listeners, "worker ping published");

        while replies.len() < listeners {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining < MIN_BLOCK {
                break;
            }
            let popped: Option<(String, String)> = redis::cmd("BLPOP")
                .arg(&reply_key)
                .arg(remaining.as_secs_f64())
                .query_async(&mut conn)
                .await?;
            match popped {
                Some((_, worker_id)) => replies.push(worker_id),
                None => break,
            }
        }
        if listeners > 0 {
            let _: Result<(), _> = redis::cmd("DEL").arg(&reply_key).query_async(&mut conn).await;
        }
        self.blocking.checkin(conn);
        Ok(())
    }
}

fn task_key(task_id: &str) -> String {
    format!("{}{}", TASK_KEY_PREFIX, task_id)
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let record = serde_json::to_string(&TaskRecord::pending(&job.task_id))?;
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(task_key(&job.task_id))
            .arg(record)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .ignore()
            .cmd("LPUSH")
            .arg(QUEUE_KEY)
            .arg(payload)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn next_job(&self, wait: Duration) -> Result<Option<Job>, QueueError> {
        let mut conn = self.blocking_conn().await?;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(QUEUE_KEY)
            .arg(wait.max(MIN_BLOCK).as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.blocking.checkin(conn);
        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn mark_started(&self, task_id: &str, worker_id: &str) -> Result<(), QueueError> {
        let mut record = self.load_or_pending(task_id).await?;
        record.start(worker_id);
        self.save(&record).await
    }

    async fn store_outcome(&self, task_id: &str, outcome: TaskOutcome) -> Result<(), QueueError> {
        let mut record = self.load_or_pending(task_id).await?;
        record.finish(outcome);
        self.save(&record).await
    }

    async fn task_record(&self, task_id: &str) -> Result<Option<TaskRecord>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(task_key(task_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<bool, QueueError> {
        let mut conn = self.conn().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong.eq_ignore_ascii_case("PONG"))
    }

    async fn ping_workers(&self, timeout: Duration) -> Result<Vec<String>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut replies = Vec::new();
        let collected = tokio::time::timeout(
            timeout + PING_GRACE,
            self.collect_ping_replies(deadline, &mut replies),
        )
        .await;
        match collected {
            Ok(Ok(())) => Ok(replies),
            Ok(Err(err)) => Err(err),
            Err(_) if !replies.is_empty() => Ok(replies),
            Err(_) => Err(QueueError::Timeout(timeout)),
        }
    }

    async fn serve_pings(
        &self,
        worker_id: &str,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(CONTROL_CHANNEL).await?;
        let mut conn = self.conn().await?;
        let mut messages = pubsub.on_message();

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
                msg = messages.next() => {
                    let msg = msg.ok_or(QueueError::Closed)?;
                    let reply_key: String = match msg.get_payload() {
                        Ok(key) => key,
                        Err(err) => {
                            warn!(error = %err, "ignoring malformed control message");
                            continue;
                        }
                    };
                    redis::pipe()
                        .cmd("LPUSH")
                        .arg(&reply_key)
                        .arg(worker_id)
                        .ignore()
                        .cmd("EXPIRE")
                        .arg(&reply_key)
                        .arg(REPLY_TTL_SECS)
                        .ignore()
                        .query_async::<_, ()>(&mut conn)
                        .await?;
                }
            }
        }
    }
}
