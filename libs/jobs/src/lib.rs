//! Background jobs for the email pipeline.
//!
//! Two job families run here: the chained validation job that walks the
//! client table page by page, and the per-client send job with provider
//! fallback. Jobs move through a [`JobQueue`] (Redis streams in
//! production, in-memory for tests) and are driven by a [`JobRunner`]
//! that applies timeouts, linear-backoff retries, and the permanent
//! failure hook.

pub mod error;
pub mod queue;
pub mod redis_queue;
pub mod runner;
pub mod send;
pub mod streams;
pub mod validity;

pub use error::{ErrorCategory, JobError};
pub use queue::{Delivery, InMemoryJobQueue, JobQueue, QueueJob};
pub use redis_queue::RedisJobQueue;
pub use runner::{JobProcessor, JobRunner, RetryPolicy};
pub use send::{SendClientEmailJob, SendEmailProcessor};
pub use streams::{SendStream, StreamDef, ValidityStream};
pub use validity::{CheckEmailValidityJob, ValidityCheckProcessor};
