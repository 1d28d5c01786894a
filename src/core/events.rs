//! Domain lifecycle events and the in-process event bus
//!
//! Every committed mutation publishes one [`WorkspaceEventBatch`] holding one
//! [`DomainEvent`] per affected record. The [`EventBus`] uses
//! `tokio::sync::broadcast` so that the runner never waits on subscribers.
//!
//! ```text
//! QueryRunner ──▶ EventEmitter::emit() ──▶ broadcast channel ──▶ subscribers
//!                                                           └──▶ workspace_stream(ws)
//! ```

use crate::core::metadata::ObjectMetadata;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// Lifecycle action of a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEventAction {
    Created,
    Updated,
    Deleted,
    Destroyed,
    Restored,
}

impl DatabaseEventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEventAction::Created => "created",
            DatabaseEventAction::Updated => "updated",
            DatabaseEventAction::Deleted => "deleted",
            DatabaseEventAction::Destroyed => "destroyed",
            DatabaseEventAction::Restored => "restored",
        }
    }

    /// `<object>.<action>`, e.g. `person.created`
    pub fn event_name(&self, object_name: &str) -> String {
        format!("{}.{}", object_name, self.as_str())
    }
}

impl fmt::Display for DatabaseEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Before/after snapshots of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProperties {
    pub before: Option<Value>,
    pub after: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_fields: Option<Vec<String>>,
}

/// One affected record of a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub user_id: Option<Uuid>,
    pub record_id: Uuid,
    pub object_metadata: ObjectMetadata,
    pub properties: EventProperties,
}

/// All events of one mutation call, scoped to a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEventBatch {
    pub name: String,
    pub workspace_id: Uuid,
    pub events: Vec<DomainEvent>,
}

/// Bus envelope around a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub batch: WorkspaceEventBatch,
}

impl EventEnvelope {
    pub fn new(batch: WorkspaceEventBatch) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            batch,
        }
    }
}

/// Event sink used by the runner
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Publish `events` under `event_name` on the workspace channel
    async fn emit(&self, event_name: &str, events: Vec<DomainEvent>, workspace_id: Uuid)
    -> Result<()>;
}

/// Broadcast-based event bus
///
/// Cheap to clone. Slow receivers lag instead of blocking publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` envelopes per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a batch, returns the number of receivers reached
    pub fn publish(&self, batch: WorkspaceEventBatch) -> usize {
        // send() only fails when nobody listens
        self.sender.send(EventEnvelope::new(batch)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Stream of the envelopes of a single workspace
    ///
    /// Lagged envelopes are skipped.
    pub fn workspace_stream(
        &self,
        workspace_id: Uuid,
    ) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |received| match received {
            Ok(envelope) if envelope.batch.workspace_id == workspace_id => Some(envelope),
            Ok(_) => None,
            Err(lagged) => {
                tracing::warn!(workspace_id = %workspace_id, error = %lagged, "event stream lagged");
                None
            }
        })
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventEmitter for EventBus {
    async fn emit(
        &self,
        event_name: &str,
        events: Vec<DomainEvent>,
        workspace_id: Uuid,
    ) -> Result<()> {
        let receivers = self.publish(WorkspaceEventBatch {
            name: event_name.to_string(),
            workspace_id,
            events,
        });
        tracing::debug!(event = event_name, receivers, "published event batch");
        Ok(())
    }
}
