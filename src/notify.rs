use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::records::PostRecord;

/// Fire-and-forget webhook notifications. A failed notification is logged
/// and dropped — it never rolls back the state transition that triggered it.
pub struct Notifier {
    client: reqwest::Client,
    webhook: Option<String>,
}

impl Notifier {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            webhook: settings.notify_webhook.clone(),
        })
    }

    /// A notifier with no webhook configured; every call is a no-op.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook: None,
        }
    }

    pub async fn notify_revised(&self, record: &PostRecord, new_version: u32) {
        let Some(url) = &self.webhook else {
            return;
        };

        let payload = serde_json::json!({
            "event": "post_revised",
            "record_id": record.id,
            "topic": record.topic,
            "version": new_version,
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(record_id = %record.id, "revision notification sent");
            }
            Ok(resp) => {
                warn!(record_id = %record.id, status = %resp.status(), "notification rejected");
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "notification failed");
            }
        }
    }
}
