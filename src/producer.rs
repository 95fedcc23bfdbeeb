//! NATS producer for raised alerts

use crate::types::Alert;
use anyhow::Result;
use async_nats::Client;
use tracing::{debug, error};

/// Publishes alerts as JSON on the alert subject
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    pub async fn publish(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            "Published alert"
        );

        Ok(())
    }

    /// Publish alerts one by one; a failure is logged and does not stop the rest.
    pub async fn publish_batch(&self, alerts: &[Alert]) -> usize {
        let mut published = 0;
        for alert in alerts {
            match self.publish(alert).await {
                Ok(()) => published += 1,
                Err(e) => error!(alert_id = alert.id, error = %e, "Failed to publish alert"),
            }
        }
        published
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
