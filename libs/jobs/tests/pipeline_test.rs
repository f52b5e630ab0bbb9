//! End-to-end tests for the validation chain and the send job, driven
//! through the in-memory queue and repository.

use client_store::{ClientRecord, ClientRepository, EmailStatus, InMemoryClientRepository};
use core_config::mail::MailConfig;
use email_validation::{EmailValidationService, StaticResolver};
use email_jobs::{
    CheckEmailValidityJob, InMemoryJobQueue, JobError, JobProcessor, JobQueue, JobRunner,
    RetryPolicy, SendClientEmailJob, SendEmailProcessor, ValidityCheckProcessor,
};
use mail_providers::{EmailProvider, MockProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;

fn validator() -> Arc<EmailValidationService> {
    let resolver = StaticResolver::new()
        .with_domain("realdomain.com", true, true)
        .with_domain("corp.com", true, false)
        .with_domain("deadmail.com", false, false);
    Arc::new(EmailValidationService::new(Arc::new(resolver)))
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    }
}

fn validity_runner(
    repository: Arc<InMemoryClientRepository>,
) -> (
    JobRunner<CheckEmailValidityJob, ValidityCheckProcessor>,
    Arc<InMemoryJobQueue<CheckEmailValidityJob>>,
) {
    let queue = Arc::new(InMemoryJobQueue::new());
    let processor = Arc::new(ValidityCheckProcessor::new(
        repository,
        validator(),
        queue.clone() as Arc<dyn JobQueue<CheckEmailValidityJob>>,
        Duration::ZERO,
    ));
    (
        JobRunner::new(queue.clone(), processor, fast_policy()),
        queue,
    )
}

#[tokio::test]
async fn test_validity_chain_end_to_end() {
    let repository = Arc::new(InMemoryClientRepository::new());
    repository
        .insert(ClientRecord::new(1, "Good", "ok@realdomain.com"))
        .await
        .unwrap();
    repository
        .insert(ClientRecord::new(2, "Tester", "test@example.com"))
        .await
        .unwrap();
    repository
        .insert(ClientRecord::new(3, "Ghost", "user@deadmail.com"))
        .await
        .unwrap();

    let (runner, queue) = validity_runner(repository.clone());
    queue
        .enqueue(CheckEmailValidityJob::new(1, 10), None)
        .await
        .unwrap();

    let handled = runner.run_until_idle().await.unwrap();
    assert_eq!(handled, 1);

    let good = repository.get(1).await.unwrap();
    assert!(good.is_email_valid);
    assert_eq!(good.email_status, EmailStatus::Valid);
    assert_eq!(good.email_validation_attempts, 1);
    assert!(good.email_validation_details.is_some());

    let tester = repository.get(2).await.unwrap();
    assert!(!tester.is_email_valid);
    assert_eq!(tester.email_status, EmailStatus::Invalid);
    assert_eq!(tester.email_validation_reason.as_deref(), Some("Test domain email"));

    let ghost = repository.get(3).await.unwrap();
    assert!(!ghost.is_email_valid);
    assert_eq!(
        ghost.email_validation_reason.as_deref(),
        Some("Domain has no MX or A records")
    );
}

#[tokio::test]
async fn test_chain_covers_stable_set_in_ceil_pages() {
    // Addresses that validate as invalid stay in the awaiting set, so the
    // page windows never shift: 25 records at 10 per chunk is 3 pages.
    let repository = Arc::new(InMemoryClientRepository::new());
    for id in 1..=25 {
        repository
            .insert(ClientRecord::new(id, "Tester", format!("test{id}@example.com")))
            .await
            .unwrap();
    }

    let (runner, queue) = validity_runner(repository.clone());
    queue
        .enqueue(CheckEmailValidityJob::new(1, 10), None)
        .await
        .unwrap();

    let handled = runner.run_until_idle().await.unwrap();
    assert_eq!(handled, 3);

    for id in 1..=25 {
        let client = repository.get(id).await.unwrap();
        assert_eq!(client.email_validation_attempts, 1, "client {id} validated once");
        assert!(!client.is_email_valid);
    }
}

#[tokio::test]
async fn test_chain_offset_skips_when_set_shrinks() {
    // Records that validate successfully leave the awaiting set, so later
    // offsets skip over records that were never looked at. The chain still
    // terminates; the skipped rows are picked up by the next full run.
    let repository = Arc::new(InMemoryClientRepository::new());
    for id in 1..=25 {
        repository
            .insert(ClientRecord::new(id, "Good", format!("user{id}@realdomain.com")))
            .await
            .unwrap();
    }

    let (runner, queue) = validity_runner(repository.clone());
    queue
        .enqueue(CheckEmailValidityJob::new(1, 10), None)
        .await
        .unwrap();

    let handled = runner.run_until_idle().await.unwrap();
    assert_eq!(handled, 2);

    let validated = repository.count_unvalidated().await.unwrap();
    // Pages 1 and 2 covered ids 1-10 and 21-25; 11-20 remain.
    assert_eq!(validated, 10);
    assert_eq!(repository.get(15).await.unwrap().email_validation_attempts, 0);
    assert_eq!(repository.get(25).await.unwrap().email_validation_attempts, 1);
}

#[tokio::test]
async fn test_validity_job_idempotent_when_nothing_pending() {
    let repository = Arc::new(InMemoryClientRepository::new());
    repository
        .insert(ClientRecord::new(1, "Good", "ok@realdomain.com"))
        .await
        .unwrap();

    let (runner, queue) = validity_runner(repository.clone());
    queue
        .enqueue(CheckEmailValidityJob::new(1, 10), None)
        .await
        .unwrap();
    assert_eq!(runner.run_until_idle().await.unwrap(), 1);

    // Re-running the seed job finds nothing and does not reschedule.
    queue
        .enqueue(CheckEmailValidityJob::new(1, 10), None)
        .await
        .unwrap();
    assert_eq!(runner.run_until_idle().await.unwrap(), 1);
    assert_eq!(repository.get(1).await.unwrap().email_validation_attempts, 1);
}

fn mail_config() -> MailConfig {
    MailConfig {
        default_provider: "sendgrid".to_string(),
        provider_priority: vec![
            "sendgrid".to_string(),
            "mailgun".to_string(),
            "smtp".to_string(),
        ],
        ..MailConfig::default()
    }
}

fn register_mock(factory: &ProviderFactory, mock: Arc<MockProvider>) {
    let name = mock.name();
    factory.register(name, move |_| Ok(mock.clone() as Arc<dyn EmailProvider>));
}

async fn queued_client(repository: &InMemoryClientRepository, id: i64) -> ClientRecord {
    let client = ClientRecord::new(id, "Ada", format!("ada{id}@corp.com"));
    repository.insert(client.clone()).await.unwrap();
    repository
        .set_email_status(id, EmailStatus::Queued)
        .await
        .unwrap();
    repository.get(id).await.unwrap()
}

#[tokio::test]
async fn test_send_success_assigns_default_provider() {
    let repository = Arc::new(InMemoryClientRepository::new());
    queued_client(&repository, 1).await;

    let factory = Arc::new(ProviderFactory::new());
    let sendgrid = Arc::new(MockProvider::named("sendgrid"));
    register_mock(&factory, sendgrid.clone());

    let processor = Arc::new(SendEmailProcessor::new(
        repository.clone(),
        factory,
        mail_config(),
    ));
    let queue = Arc::new(InMemoryJobQueue::new());
    queue
        .enqueue(
            SendClientEmailJob::new(1, "Welcome").with_text("hello"),
            None,
        )
        .await
        .unwrap();

    let runner = JobRunner::new(queue, processor, fast_policy());
    assert_eq!(runner.run_until_idle().await.unwrap(), 1);

    let client = repository.get(1).await.unwrap();
    assert_eq!(client.email_status, EmailStatus::Sent);
    assert_eq!(client.email_provider.as_deref(), Some("sendgrid"));
    assert!(client.email_sent_at.is_some());
    assert!(sendgrid.was_sent_to("ada1@corp.com").await);
}

#[tokio::test]
async fn test_failed_attempt_advances_provider_and_requeues_status() {
    let repository = Arc::new(InMemoryClientRepository::new());
    queued_client(&repository, 1).await;

    let factory = Arc::new(ProviderFactory::new());
    register_mock(&factory, Arc::new(MockProvider::failing("sendgrid")));
    register_mock(&factory, Arc::new(MockProvider::named("mailgun")));

    let processor = SendEmailProcessor::new(repository.clone(), factory, mail_config());
    let job = SendClientEmailJob::new(1, "Welcome").with_text("hello");

    let err = processor.process(&job).await.unwrap_err();
    assert!(matches!(err, JobError::Processing { .. }));

    let client = repository.get(1).await.unwrap();
    assert_eq!(client.email_provider.as_deref(), Some("mailgun"));
    assert_eq!(client.email_status, EmailStatus::Queued);
}

#[tokio::test]
async fn test_send_falls_through_providers_then_fails() {
    let repository = Arc::new(InMemoryClientRepository::new());
    queued_client(&repository, 1).await;

    let factory = Arc::new(ProviderFactory::new());
    let sendgrid = Arc::new(MockProvider::failing("sendgrid"));
    let mailgun = Arc::new(MockProvider::failing("mailgun"));
    let smtp = Arc::new(MockProvider::failing("smtp"));
    register_mock(&factory, sendgrid.clone());
    register_mock(&factory, mailgun.clone());
    register_mock(&factory, smtp.clone());

    let processor = Arc::new(SendEmailProcessor::new(
        repository.clone(),
        factory,
        mail_config(),
    ));
    let queue = Arc::new(InMemoryJobQueue::new());
    queue
        .enqueue(
            SendClientEmailJob::new(1, "Welcome").with_text("hello"),
            None,
        )
        .await
        .unwrap();

    let runner = JobRunner::new(queue, processor, fast_policy());
    assert_eq!(runner.run_until_idle().await.unwrap(), 3);

    let client = repository.get(1).await.unwrap();
    assert_eq!(client.email_status, EmailStatus::Failed);
    // Each failed attempt advanced one step down the priority list.
    assert_eq!(client.email_provider.as_deref(), Some("smtp"));
    assert_eq!(sendgrid.sent_count().await, 0);
    assert_eq!(mailgun.sent_count().await, 0);
    assert_eq!(smtp.sent_count().await, 0);
}

#[tokio::test]
async fn test_send_recovers_on_second_provider() {
    let repository = Arc::new(InMemoryClientRepository::new());
    queued_client(&repository, 1).await;

    let factory = Arc::new(ProviderFactory::new());
    register_mock(&factory, Arc::new(MockProvider::failing("sendgrid")));
    let mailgun = Arc::new(MockProvider::named("mailgun"));
    register_mock(&factory, mailgun.clone());

    let processor = Arc::new(SendEmailProcessor::new(
        repository.clone(),
        factory,
        mail_config(),
    ));
    let queue = Arc::new(InMemoryJobQueue::new());
    queue
        .enqueue(
            SendClientEmailJob::new(1, "Welcome").with_text("hello"),
            None,
        )
        .await
        .unwrap();

    let runner = JobRunner::new(queue, processor, fast_policy());
    assert_eq!(runner.run_until_idle().await.unwrap(), 2);

    let client = repository.get(1).await.unwrap();
    assert_eq!(client.email_status, EmailStatus::Sent);
    assert_eq!(client.email_provider.as_deref(), Some("mailgun"));
    assert!(mailgun.was_sent_to("ada1@corp.com").await);
}

#[tokio::test]
async fn test_send_for_missing_client_is_permanent() {
    let repository = Arc::new(InMemoryClientRepository::new());
    let factory = Arc::new(ProviderFactory::new());
    register_mock(&factory, Arc::new(MockProvider::named("sendgrid")));

    let processor = SendEmailProcessor::new(repository, factory, mail_config());
    let job = SendClientEmailJob::new(404, "Welcome").with_text("hello");

    let err = processor.process(&job).await.unwrap_err();
    assert_eq!(err.category(), email_jobs::ErrorCategory::Permanent);
}
