//! Email worker wiring.
//!
//! Builds the validation service, the provider factory, and the two job
//! runners, then polls the queues until interrupted. Queues live on Redis
//! streams when `REDIS_URL` is set and fall back to in-process queues for
//! local development.

use client_store::{ClientRecord, ClientRepository, InMemoryClientRepository};
use core_config::mail::MailConfig;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{env_or_default, Environment};
use email_jobs::{
    CheckEmailValidityJob, InMemoryJobQueue, JobQueue, JobRunner, QueueJob, RedisJobQueue,
    RetryPolicy, SendClientEmailJob, SendEmailProcessor, SendStream, StreamDef,
    ValidityCheckProcessor, ValidityStream,
};
use email_validation::EmailValidationService;
use eyre::WrapErr;
use mail_providers::ProviderFactory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

fn build_queue<J: QueueJob, S: StreamDef>(
    redis: Option<&redis::aio::ConnectionManager>,
) -> Arc<dyn JobQueue<J>> {
    match redis {
        Some(conn) => Arc::new(RedisJobQueue::<J>::from_stream_def::<S>(conn.clone())),
        None => Arc::new(InMemoryJobQueue::new()),
    }
}

/// Load seed records from `CLIENT_SEED_FILE` (a JSON array of client
/// records) into the in-memory store.
async fn seed_clients(repository: &dyn ClientRepository) -> eyre::Result<usize> {
    let Ok(path) = std::env::var("CLIENT_SEED_FILE") else {
        return Ok(0);
    };

    let contents = tokio::fs::read_to_string(&path)
        .await
        .wrap_err_with(|| format!("Failed to read client seed file {path}"))?;
    let clients: Vec<ClientRecord> =
        serde_json::from_str(&contents).wrap_err("Invalid client seed file")?;

    let count = clients.len();
    for client in clients {
        repository.insert(client).await?;
    }
    Ok(count)
}

pub async fn run() -> eyre::Result<()> {
    install_color_eyre();
    let environment = Environment::from_env();
    init_tracing(&environment);

    let config = MailConfig::from_env();
    info!(
        default_provider = %config.default_provider,
        priority = ?config.provider_priority,
        chunk_size = config.validity_chunk_size,
        "Starting email worker"
    );

    let factory = Arc::new(ProviderFactory::with_defaults());
    let validator = Arc::new(EmailValidationService::with_system_resolver());
    let repository: Arc<InMemoryClientRepository> = Arc::new(InMemoryClientRepository::new());

    let seeded = seed_clients(repository.as_ref()).await?;
    if seeded > 0 {
        info!(count = seeded, "Seeded client records");
    }

    let redis = match std::env::var("REDIS_URL") {
        Ok(url) => {
            let client = redis::Client::open(url).wrap_err("Invalid REDIS_URL")?;
            let conn = client
                .get_connection_manager()
                .await
                .wrap_err("Failed to connect to Redis")?;
            info!("Using Redis stream queues");
            Some(conn)
        }
        Err(_) => {
            warn!("REDIS_URL not set, using in-process queues");
            None
        }
    };

    let validity_queue = build_queue::<CheckEmailValidityJob, ValidityStream>(redis.as_ref());
    let send_queue = build_queue::<SendClientEmailJob, SendStream>(redis.as_ref());

    let policy = RetryPolicy {
        max_attempts: config.max_job_attempts,
        backoff: Duration::from_secs(config.retry_backoff_secs),
    };
    let job_timeout = Duration::from_secs(config.job_timeout_secs);

    let validity_processor = Arc::new(ValidityCheckProcessor::new(
        repository.clone(),
        validator,
        validity_queue.clone(),
        Duration::from_secs(config.reschedule_delay_secs),
    ));
    let send_processor = Arc::new(SendEmailProcessor::new(
        repository.clone(),
        factory,
        config.clone(),
    ));

    // Kick off the validation chain unless explicitly disabled.
    if env_or_default("RUN_VALIDATION", "1") == "1" {
        validity_queue
            .enqueue(CheckEmailValidityJob::new(1, config.validity_chunk_size), None)
            .await?;
        info!(chunk_size = config.validity_chunk_size, "Seeded validation chain");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let validity_runner = JobRunner::new(validity_queue, validity_processor, policy.clone())
        .with_job_timeout(job_timeout);
    let send_runner =
        JobRunner::new(send_queue, send_processor, policy).with_job_timeout(job_timeout);

    let (validity_result, send_result) = tokio::join!(
        validity_runner.run(shutdown_rx.clone()),
        send_runner.run(shutdown_rx),
    );
    validity_result?;
    send_result?;

    info!("Email worker stopped");
    Ok(())
}
