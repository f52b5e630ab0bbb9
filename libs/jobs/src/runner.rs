//! Job execution loop: timeout, retry with linear backoff, permanent
//! failure hook, acknowledgment.

use crate::error::{ErrorCategory, JobError};
use crate::queue::{Delivery, JobQueue, QueueJob};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Retry settings shared by every job family.
///
/// The backoff is linear: attempt n waits `backoff * n` before requeue.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `retry_count` prior retries.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.backoff * (retry_count + 1)
    }
}

#[async_trait]
pub trait JobProcessor<J: QueueJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), JobError>;

    fn name(&self) -> &'static str;

    /// Called once when a job is out of retries or failed permanently.
    async fn on_permanent_failure(&self, _job: &J) {}
}

pub struct JobRunner<J: QueueJob, P: JobProcessor<J>> {
    queue: Arc<dyn JobQueue<J>>,
    processor: Arc<P>,
    policy: RetryPolicy,
    job_timeout: Duration,
    poll_interval: Duration,
}

impl<J: QueueJob, P: JobProcessor<J>> JobRunner<J, P> {
    pub fn new(queue: Arc<dyn JobQueue<J>>, processor: Arc<P>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            processor,
            policy,
            job_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn handle_delivery(&self, delivery: Delivery<J>) -> Result<(), JobError> {
        let job = delivery.job;

        debug!(
            processor = self.processor.name(),
            job_id = %job.job_id(),
            retry_count = job.retry_count(),
            "Processing job"
        );

        let outcome = match tokio::time::timeout(self.job_timeout, self.processor.process(&job)).await
        {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout(self.job_timeout)),
        };

        match outcome {
            Ok(()) => {
                debug!(
                    processor = self.processor.name(),
                    job_id = %job.job_id(),
                    "Job completed"
                );
            }
            Err(e) => {
                let attempt = job.retry_count() + 1;
                let retryable = e.category() == ErrorCategory::Transient
                    && attempt < self.policy.max_attempts;

                if retryable {
                    let delay = self.policy.delay_for(job.retry_count());
                    warn!(
                        processor = self.processor.name(),
                        job_id = %job.job_id(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Job failed, retrying"
                    );
                    self.queue.enqueue(job.with_retry(), Some(delay)).await?;
                } else {
                    error!(
                        processor = self.processor.name(),
                        job_id = %job.job_id(),
                        attempt,
                        error = %e,
                        "Job permanently failed"
                    );
                    self.processor.on_permanent_failure(&job).await;
                }
            }
        }

        if let Some(receipt) = delivery.receipt {
            self.queue.ack(&receipt).await?;
        }
        Ok(())
    }

    /// Drain the queue, then return the number of jobs handled. Retries
    /// and rescheduled chain pages count as separate jobs.
    pub async fn run_until_idle(&self) -> Result<u64, JobError> {
        let mut handled = 0;
        while let Some(delivery) = self.queue.dequeue().await? {
            self.handle_delivery(delivery).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Poll the queue until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), JobError> {
        info!(processor = self.processor.name(), "Worker loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                dequeued = self.queue.dequeue() => {
                    match dequeued? {
                        Some(delivery) => self.handle_delivery(delivery).await?,
                        None => tokio::time::sleep(self.poll_interval).await,
                    }
                }
            }
        }

        info!(processor = self.processor.name(), "Worker loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryJobQueue;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestJob {
        id: u32,
        retry_count: u32,
    }

    impl QueueJob for TestJob {
        fn job_id(&self) -> String {
            self.id.to_string()
        }

        fn retry_count(&self) -> u32 {
            self.retry_count
        }

        fn with_retry(&self) -> Self {
            Self {
                retry_count: self.retry_count + 1,
                ..self.clone()
            }
        }
    }

    struct CountingProcessor {
        attempts: AtomicU32,
        permanent_failures: AtomicU32,
        fail_first: u32,
    }

    impl CountingProcessor {
        fn new(fail_first: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                permanent_failures: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl JobProcessor<TestJob> for CountingProcessor {
        async fn process(&self, _job: &TestJob) -> Result<(), JobError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                Err(JobError::transient("induced failure"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn on_permanent_failure(&self, _job: &TestJob) {
            self.permanent_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn runner(
        queue: Arc<InMemoryJobQueue<TestJob>>,
        processor: Arc<CountingProcessor>,
    ) -> JobRunner<TestJob, CountingProcessor> {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        };
        JobRunner::new(queue, processor, policy)
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(CountingProcessor::new(0));
        queue.enqueue(TestJob { id: 1, retry_count: 0 }, None).await.unwrap();

        let handled = runner(queue, processor.clone()).run_until_idle().await.unwrap();
        assert_eq!(handled, 1);
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(processor.permanent_failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(CountingProcessor::new(2));
        queue.enqueue(TestJob { id: 1, retry_count: 0 }, None).await.unwrap();

        let handled = runner(queue, processor.clone()).run_until_idle().await.unwrap();
        assert_eq!(handled, 3);
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(processor.permanent_failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted_calls_hook() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(CountingProcessor::new(u32::MAX));
        queue.enqueue(TestJob { id: 1, retry_count: 0 }, None).await.unwrap();

        let handled = runner(queue.clone(), processor.clone()).run_until_idle().await.unwrap();
        assert_eq!(handled, 3);
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(processor.permanent_failures.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retries() {
        struct PermanentProcessor {
            hook_calls: AtomicU32,
        }

        #[async_trait]
        impl JobProcessor<TestJob> for PermanentProcessor {
            async fn process(&self, _job: &TestJob) -> Result<(), JobError> {
                Err(JobError::permanent("not retryable"))
            }

            fn name(&self) -> &'static str {
                "permanent"
            }

            async fn on_permanent_failure(&self, _job: &TestJob) {
                self.hook_calls.fetch_add(1, Ordering::SeqCst);
            }
        }

        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(PermanentProcessor {
            hook_calls: AtomicU32::new(0),
        });
        queue.enqueue(TestJob { id: 1, retry_count: 0 }, None).await.unwrap();

        let runner = JobRunner::new(
            queue.clone() as Arc<dyn JobQueue<TestJob>>,
            processor.clone(),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        );
        let handled = runner.run_until_idle().await.unwrap();
        assert_eq!(handled, 1);
        assert_eq!(processor.hook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_delayed_wait_keeps_job() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(CountingProcessor::new(0));
        queue
            .enqueue(TestJob { id: 1, retry_count: 0 }, Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = runner(queue.clone(), processor.clone());
        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        // The not-yet-due job must survive the interrupted wait.
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_times_out_and_retries() {
        struct SlowProcessor {
            attempts: AtomicU32,
            permanent_failures: AtomicU32,
        }

        #[async_trait]
        impl JobProcessor<TestJob> for SlowProcessor {
            async fn process(&self, _job: &TestJob) -> Result<(), JobError> {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(())
            }

            fn name(&self) -> &'static str {
                "slow"
            }

            async fn on_permanent_failure(&self, _job: &TestJob) {
                self.permanent_failures.fetch_add(1, Ordering::SeqCst);
            }
        }

        let queue = Arc::new(InMemoryJobQueue::new());
        let processor = Arc::new(SlowProcessor {
            attempts: AtomicU32::new(0),
            permanent_failures: AtomicU32::new(0),
        });
        queue.enqueue(TestJob { id: 1, retry_count: 0 }, None).await.unwrap();

        let runner = JobRunner::new(
            queue.clone() as Arc<dyn JobQueue<TestJob>>,
            processor.clone(),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        )
        .with_job_timeout(Duration::from_millis(50));

        // Timeouts are transient: retried until attempts run out.
        let handled = runner.run_until_idle().await.unwrap();
        assert_eq!(handled, 3);
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(processor.permanent_failures.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty().await);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(30));
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(90));
    }
}
