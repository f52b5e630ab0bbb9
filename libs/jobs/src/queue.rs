//! Queue abstraction and the in-memory implementation.

use crate::error::JobError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A payload that can travel through a [`JobQueue`].
pub trait QueueJob: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable identifier for log correlation.
    fn job_id(&self) -> String;

    /// Number of retries already applied to this payload.
    fn retry_count(&self) -> u32;

    /// Copy with the retry count bumped, for requeueing.
    fn with_retry(&self) -> Self;
}

/// A dequeued job plus the receipt needed to acknowledge it.
#[derive(Debug)]
pub struct Delivery<J> {
    pub job: J,
    /// Backend receipt (Redis stream ID); `None` for backends without acks.
    pub receipt: Option<String>,
}

#[async_trait]
pub trait JobQueue<J: QueueJob>: Send + Sync {
    /// Enqueue a job, optionally delayed. Returns a backend message id.
    async fn enqueue(&self, job: J, delay: Option<Duration>) -> Result<String, JobError>;

    /// Next job, or `None` when the queue is empty. Implementations may
    /// wait for a not-yet-due delayed job instead of skipping it.
    async fn dequeue(&self) -> Result<Option<Delivery<J>>, JobError>;

    async fn ack(&self, receipt: &str) -> Result<(), JobError>;
}

/// FIFO queue in process memory. Delayed entries hold their slot; `dequeue`
/// sleeps until the earliest entry is due, which keeps chained-job tests
/// deterministic. Entries are only removed once due, so cancelling a
/// waiting `dequeue` never loses a job.
pub struct InMemoryJobQueue<J> {
    entries: Mutex<VecDeque<(J, Instant)>>,
}

impl<J> InMemoryJobQueue<J> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<J> Default for InMemoryJobQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<J: QueueJob> JobQueue<J> for InMemoryJobQueue<J> {
    async fn enqueue(&self, job: J, delay: Option<Duration>) -> Result<String, JobError> {
        let not_before = Instant::now() + delay.unwrap_or(Duration::ZERO);
        let mut entries = self.entries.lock().await;
        entries.push_back((job, not_before));
        Ok(format!("mem-{}", entries.len()))
    }

    async fn dequeue(&self) -> Result<Option<Delivery<J>>, JobError> {
        loop {
            let next_due = {
                let mut entries = self.entries.lock().await;
                let earliest = entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (_, due))| *due)
                    .map(|(i, (_, due))| (i, *due));
                let Some((index, due)) = earliest else {
                    return Ok(None);
                };
                if due <= Instant::now() {
                    let Some((job, _)) = entries.remove(index) else {
                        continue;
                    };
                    return Ok(Some(Delivery { job, receipt: None }));
                }
                due
            };

            // The entry stays queued while we wait, so a cancelled dequeue
            // leaves it in place for the next poll.
            tokio::time::sleep_until(next_due).await;
        }
    }

    async fn ack(&self, _receipt: &str) -> Result<(), JobError> {
        Ok(())
    }
}
