//! Outbound delivery of webhook payloads

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST `payload` to `target_url`; an error makes the job retry
    async fn send(&self, target_url: &str, payload: &Value) -> anyhow::Result<()>;
}

/// Logs deliveries instead of sending them, keeping a copy of each
#[derive(Debug, Clone, Default)]
pub struct LoggingWebhookSender {
    sent: Arc<Mutex<Vec<(String, Value)>>>,
}

impl LoggingWebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebhookSender for LoggingWebhookSender {
    async fn send(&self, target_url: &str, payload: &Value) -> anyhow::Result<()> {
        let event_type = payload
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        tracing::info!(target_url, event_type, "webhook delivered");
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire lock: {}", e))?
            .push((target_url.to_string(), payload.clone()));
        Ok(())
    }
}

/// Sends payloads as JSON over HTTP
#[cfg(feature = "webhook-http")]
#[derive(Debug, Clone, Default)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

#[cfg(feature = "webhook-http")]
impl HttpWebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "webhook-http")]
#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, target_url: &str, payload: &Value) -> anyhow::Result<()> {
        let response = self.client.post(target_url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook target {} answered {}", target_url, status);
        }
        tracing::debug!(target_url, status = status.as_u16(), "webhook delivered");
        Ok(())
    }
}
