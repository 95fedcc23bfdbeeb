//! NATS consumer for transaction submissions and flag commands

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use serde::de::DeserializeOwned;
use tracing::info;

/// Subscribes to one inbound subject and decodes its JSON payloads
pub struct SubjectConsumer {
    client: Client,
    subject: String,
}

impl SubjectConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.subject))?;
        info!(subject = %self.subject, "Subscribed");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a JSON message body received on `subject`.
pub fn decode<T: DeserializeOwned>(subject: &str, payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).with_context(|| format!("Malformed payload on {}", subject))
}
