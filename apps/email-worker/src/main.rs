//! Email worker entry point.
//!
//! Background worker that validates client emails and delivers messages
//! through the configured providers.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    email_worker::run().await
}
