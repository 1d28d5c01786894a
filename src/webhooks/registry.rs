//! Per-workspace webhook subscriptions

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// A webhook target subscribed to an event pattern
///
/// `operation` is `<object>.<action>` where either side may be `*`, e.g.
/// `person.created`, `*.deleted`, `company.*` or `*.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: Uuid,
    pub target_url: String,
    pub operation: String,
}

impl Webhook {
    pub fn new(target_url: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_url: target_url.into(),
            operation: operation.into(),
        }
    }

    /// Whether this webhook subscribes to `event_type` (`person.created`)
    pub fn matches(&self, event_type: &str) -> bool {
        let (Some((object, action)), Some((event_object, event_action))) =
            (self.operation.split_once('.'), event_type.split_once('.'))
        else {
            return false;
        };
        (object == "*" || object == event_object) && (action == "*" || action == event_action)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebhookRegistry {
    webhooks: Arc<RwLock<HashMap<Uuid, Vec<Webhook>>>>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workspace_id: Uuid, webhook: Webhook) -> Result<()> {
        let mut webhooks = self
            .webhooks
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        webhooks.entry(workspace_id).or_default().push(webhook);
        Ok(())
    }

    /// Remove a webhook, returns whether it existed
    pub fn remove(&self, workspace_id: Uuid, webhook_id: Uuid) -> Result<bool> {
        let mut webhooks = self
            .webhooks
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let Some(list) = webhooks.get_mut(&workspace_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|w| w.id != webhook_id);
        Ok(list.len() != before)
    }

    /// Webhooks of `workspace_id` subscribed to `event_type`, in registration order
    pub fn matching(&self, workspace_id: Uuid, event_type: &str) -> Result<Vec<Webhook>> {
        let webhooks = self
            .webhooks
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(webhooks
            .get(&workspace_id)
            .map(|list| list.iter().filter(|w| w.matches(event_type)).cloned().collect())
            .unwrap_or_default())
    }
}
