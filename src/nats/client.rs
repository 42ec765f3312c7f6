use anyhow::{Context, Result};
use async_nats::Client;
use tracing::info;

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self, subject: &str) -> Result<async_nats::Subscriber> {
        // The STT service publishes partial and final results under one
        // subject tree; sessions and channels are filtered by payload.
        info!("Subscribing to transcripts on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .context("Failed to subscribe to transcripts")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }
}
