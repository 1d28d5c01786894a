//! Job handlers of the webhook pipeline
//!
//! ```text
//! CallWebhookJobsJob ──▶ one CallWebhookJob per matching webhook ──▶ WebhookSender
//! ```

use super::registry::WebhookRegistry;
use super::sender::WebhookSender;
use crate::core::queue::{JobHandler, JobOptions, JobQueue, QueuedJob};
use crate::runner::webhooks::{CALL_WEBHOOK_JOB, CallWebhookJobsJobData};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookObjectMetadata {
    pub id: Uuid,
    pub name_singular: String,
}

/// Body delivered to one webhook target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallWebhookJobData {
    pub target_url: String,
    pub event_type: String,
    pub object_metadata: WebhookObjectMetadata,
    pub workspace_id: Uuid,
    pub webhook_id: Uuid,
    pub event_date: String,
    pub record: Value,
}

/// Fans a record change out to the matching webhooks of its workspace
pub struct CallWebhookJobsJobHandler {
    registry: WebhookRegistry,
    queue: Arc<dyn JobQueue>,
    options: JobOptions,
}

impl CallWebhookJobsJobHandler {
    pub fn new(registry: WebhookRegistry, queue: Arc<dyn JobQueue>, options: JobOptions) -> Self {
        Self {
            registry,
            queue,
            options,
        }
    }
}

#[async_trait]
impl JobHandler for CallWebhookJobsJobHandler {
    async fn handle(&self, job: &QueuedJob) -> anyhow::Result<()> {
        let data: CallWebhookJobsJobData = serde_json::from_value(job.payload.clone())?;
        let event_type = data
            .operation
            .action()
            .event_name(&data.object_metadata.name_singular);

        let webhooks = self.registry.matching(data.workspace_id, &event_type)?;
        tracing::debug!(
            event_type = %event_type,
            webhooks = webhooks.len(),
            "fanning out webhook calls"
        );

        let event_date = Utc::now().to_rfc3339();
        for webhook in webhooks {
            let payload = CallWebhookJobData {
                target_url: webhook.target_url,
                event_type: event_type.clone(),
                object_metadata: WebhookObjectMetadata {
                    id: data.object_metadata.id,
                    name_singular: data.object_metadata.name_singular.clone(),
                },
                workspace_id: data.workspace_id,
                webhook_id: webhook.id,
                event_date: event_date.clone(),
                record: data.record.clone(),
            };
            self.queue
                .add(CALL_WEBHOOK_JOB, serde_json::to_value(&payload)?, self.options)
                .await?;
        }
        Ok(())
    }
}

/// Delivers one payload to one target
pub struct CallWebhookJobHandler {
    sender: Arc<dyn WebhookSender>,
}

impl CallWebhookJobHandler {
    pub fn new(sender: Arc<dyn WebhookSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl JobHandler for CallWebhookJobHandler {
    async fn handle(&self, job: &QueuedJob) -> anyhow::Result<()> {
        let data: CallWebhookJobData = serde_json::from_value(job.payload.clone())?;
        self.sender.send(&data.target_url, &job.payload).await
    }
}
