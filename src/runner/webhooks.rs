//! Payload of the jobs the runner enqueues for webhook fan-out

use crate::core::events::DatabaseEventAction;
use crate::core::metadata::ObjectMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Job fanning one record change out to the workspace's webhooks
pub const CALL_WEBHOOK_JOBS_JOB: &str = "CallWebhookJobsJob";

/// Job delivering one payload to one webhook target
pub const CALL_WEBHOOK_JOB: &str = "CallWebhookJob";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookJobOperation {
    Create,
    Update,
    Delete,
    Destroy,
    Restore,
}

impl WebhookJobOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookJobOperation::Create => "create",
            WebhookJobOperation::Update => "update",
            WebhookJobOperation::Delete => "delete",
            WebhookJobOperation::Destroy => "destroy",
            WebhookJobOperation::Restore => "restore",
        }
    }

    /// Past-tense action used in event types (`create` -> `created`)
    pub fn action(&self) -> DatabaseEventAction {
        match self {
            WebhookJobOperation::Create => DatabaseEventAction::Created,
            WebhookJobOperation::Update => DatabaseEventAction::Updated,
            WebhookJobOperation::Delete => DatabaseEventAction::Deleted,
            WebhookJobOperation::Destroy => DatabaseEventAction::Destroyed,
            WebhookJobOperation::Restore => DatabaseEventAction::Restored,
        }
    }
}

impl From<DatabaseEventAction> for WebhookJobOperation {
    fn from(action: DatabaseEventAction) -> Self {
        match action {
            DatabaseEventAction::Created => WebhookJobOperation::Create,
            DatabaseEventAction::Updated => WebhookJobOperation::Update,
            DatabaseEventAction::Deleted => WebhookJobOperation::Delete,
            DatabaseEventAction::Destroyed => WebhookJobOperation::Destroy,
            DatabaseEventAction::Restored => WebhookJobOperation::Restore,
        }
    }
}

impl fmt::Display for WebhookJobOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallWebhookJobsJobData {
    pub record: Value,
    pub workspace_id: Uuid,
    pub operation: WebhookJobOperation,
    pub object_metadata: ObjectMetadata,
}
