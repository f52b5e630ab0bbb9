//! Redis streams queue backend.
//!
//! Jobs are serialized into a single `job` field on the stream and read
//! through a consumer group, so several workers can share one stream.
//! Redis streams have no native delay, so a delayed enqueue parks the
//! XADD on a spawned sleeper task.
//!
//! Delivered-but-unacked entries sit in the group's pending list. Each
//! worker periodically claims entries idle past `claim_min_idle` onto its
//! own consumer with XAUTOCLAIM and drains its own pending list before
//! asking for new messages, so a crash between delivery and ack means
//! redelivery rather than loss.

use crate::error::JobError;
use crate::queue::{Delivery, JobQueue, QueueJob};
use crate::streams::StreamDef;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_CLAIM_MIN_IDLE: Duration = Duration::from_secs(60);

pub struct RedisJobQueue<J> {
    redis: ConnectionManager,
    stream_name: String,
    consumer_group: String,
    consumer_id: String,
    max_length: i64,
    group_ready: AtomicBool,
    claim_min_idle: Duration,
    last_claim: Mutex<Option<Instant>>,
    _job: PhantomData<fn() -> J>,
}

impl<J: QueueJob> RedisJobQueue<J> {
    pub fn new(
        redis: ConnectionManager,
        stream_name: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            max_length: 100_000,
            group_ready: AtomicBool::new(false),
            claim_min_idle: DEFAULT_CLAIM_MIN_IDLE,
            last_claim: Mutex::new(None),
            _job: PhantomData,
        }
    }

    /// Idle time after which another consumer's pending entry is claimed.
    pub fn with_claim_min_idle(mut self, idle: Duration) -> Self {
        self.claim_min_idle = idle;
        self
    }

    /// Queue bound to a [`StreamDef`], keeping producer and worker on the
    /// same stream settings.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        let mut queue = Self::new(redis, S::STREAM_NAME, S::CONSUMER_GROUP);
        queue.max_length = S::MAX_LENGTH;
        queue
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    async fn xadd(
        mut conn: ConnectionManager,
        stream_name: &str,
        max_length: i64,
        job_json: &str,
    ) -> Result<String, JobError> {
        // MAXLEN ~ trims approximately, which is cheaper for Redis.
        let stream_id: String = redis::cmd("XADD")
            .arg(stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(max_length)
            .arg("*")
            .arg("job")
            .arg(job_json)
            .query_async(&mut conn)
            .await?;
        Ok(stream_id)
    }

    async fn ensure_group(&self) -> Result<(), JobError> {
        if self.group_ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.stream_name,
                    group = %self.consumer_group,
                    "Created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.stream_name,
                    group = %self.consumer_group,
                    "Consumer group already exists"
                );
            }
            Err(e) => return Err(e.into()),
        }

        self.group_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn should_claim(&self) -> bool {
        let mut last = self.last_claim.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) if at.elapsed() < self.claim_min_idle => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    /// Claim pending entries abandoned by other consumers. Claimed entries
    /// land on this consumer's pending list and surface on the next `"0"`
    /// read.
    async fn claim_stale(&self) -> Result<(), JobError> {
        let mut conn = self.redis.clone();
        // Reply: [next-start-id, [[id, fields], ...], [deleted-ids]]
        let result: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(&self.consumer_id)
            .arg(self.claim_min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(10)
            .query_async(&mut conn)
            .await?;

        if let redis::Value::Array(parts) = &result {
            if let Some(redis::Value::Array(entries)) = parts.get(1) {
                if !entries.is_empty() {
                    info!(
                        count = entries.len(),
                        consumer = %self.consumer_id,
                        stream = %self.stream_name,
                        "Claimed stale pending messages"
                    );
                }
            }
        }
        Ok(())
    }

    /// One XREADGROUP pass. `read_id` is `"0"` for this consumer's pending
    /// entries or `">"` for new messages.
    async fn read_group(&self, read_id: &str) -> Result<Option<Delivery<J>>, JobError> {
        let mut conn = self.redis.clone();
        type StreamReply = Option<Vec<(String, Vec<(String, Option<Vec<(String, String)>>)>)>>;
        let result: RedisResult<StreamReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_id)
            .arg("COUNT")
            .arg(1)
            .arg("STREAMS")
            .arg(&self.stream_name)
            .arg(read_id)
            .query_async(&mut conn)
            .await;

        let streams = match result {
            Ok(Some(streams)) => streams,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        for (_stream, entries) in streams {
            for (stream_id, fields) in entries {
                // Trimmed entries come back with nil fields; drop them
                // from the pending list.
                let Some(fields) = fields else {
                    warn!(stream_id = %stream_id, "Entry trimmed from stream, acking and skipping");
                    self.ack(&stream_id).await?;
                    continue;
                };

                let Some(json) = fields
                    .iter()
                    .find(|(k, _)| k == "job")
                    .map(|(_, v)| v.as_str())
                else {
                    warn!(stream_id = %stream_id, "Missing 'job' field, acking and skipping");
                    self.ack(&stream_id).await?;
                    continue;
                };

                match serde_json::from_str::<J>(json) {
                    Ok(job) => {
                        return Ok(Some(Delivery {
                            job,
                            receipt: Some(stream_id),
                        }));
                    }
                    Err(e) => {
                        // Poison message: drop it rather than redeliver forever.
                        warn!(stream_id = %stream_id, error = %e, "Unparseable job, acking and skipping");
                        self.ack(&stream_id).await?;
                    }
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl<J: QueueJob> JobQueue<J> for RedisJobQueue<J> {
    async fn enqueue(&self, job: J, delay: Option<Duration>) -> Result<String, JobError> {
        let job_json = serde_json::to_string(&job)?;

        match delay.filter(|d| !d.is_zero()) {
            None => {
                let stream_id = Self::xadd(
                    self.redis.clone(),
                    &self.stream_name,
                    self.max_length,
                    &job_json,
                )
                .await?;
                debug!(
                    stream = %self.stream_name,
                    stream_id = %stream_id,
                    job_id = %job.job_id(),
                    "Enqueued job"
                );
                Ok(stream_id)
            }
            Some(delay) => {
                let conn = self.redis.clone();
                let stream_name = self.stream_name.clone();
                let max_length = self.max_length;
                let job_id = job.job_id();

                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = Self::xadd(conn, &stream_name, max_length, &job_json).await {
                        error!(
                            stream = %stream_name,
                            job_id = %job_id,
                            error = %e,
                            "Delayed enqueue failed"
                        );
                    }
                });

                Ok(format!("delayed-{}", Uuid::new_v4()))
            }
        }
    }

    async fn dequeue(&self) -> Result<Option<Delivery<J>>, JobError> {
        self.ensure_group().await?;

        if self.should_claim() {
            if let Err(e) = self.claim_stale().await {
                warn!(stream = %self.stream_name, error = %e, "Failed to claim stale pending messages");
            }
        }

        // Own pending entries first: claimed from dead consumers or left
        // unacked by a previous run of this one.
        if let Some(delivery) = self.read_group("0").await? {
            return Ok(Some(delivery));
        }

        self.read_group(">").await
    }

    async fn ack(&self, receipt: &str) -> Result<(), JobError> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(receipt)
            .query_async(&mut conn)
            .await?;

        debug!(stream_id = %receipt, "Acknowledged message");
        Ok(())
    }
}
