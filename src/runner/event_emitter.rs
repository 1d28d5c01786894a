//! Side effects of committed mutations
//!
//! The runner never emits while a mutation is in flight. Once the resolver
//! returned, it collects a [`SideEffects`] value and dispatches it:
//!
//! ```text
//! resolve ──▶ post hooks ──▶ SideEffects::collect ──▶ dispatch
//!                                                      ├─▶ JobQueue::add (one webhook job per record)
//!                                                      └─▶ EventEmitter::emit (one batch per call)
//! ```
//!
//! Dispatch failures are logged and swallowed: the write is already
//! committed, so delivery is eventually consistent.

use crate::core::events::{DatabaseEventAction, DomainEvent, EventEmitter, EventProperties};
use crate::core::queue::{JobOptions, JobQueue};
use crate::core::record::{ID_FIELD, Record, TYPENAME_FIELD};
use crate::runner::options::QueryRunnerOptions;
use crate::runner::webhooks::{CALL_WEBHOOK_JOBS_JOB, CallWebhookJobsJobData};
use serde_json::{Map, Value};
use uuid::Uuid;

fn is_connection(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key("edges"))
}

fn is_nested_record(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key(TYPENAME_FIELD))
}

/// Record snapshot as carried by events: no type names, no relations
pub fn sanitize_snapshot(record: &Record) -> Value {
    let fields: Map<String, Value> = record
        .iter()
        .filter(|(key, value)| {
            key.as_str() != TYPENAME_FIELD && !is_connection(value) && !is_nested_record(value)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(fields)
}

/// Events and webhook jobs of one mutation call
#[derive(Debug, Clone, PartialEq)]
pub struct SideEffects {
    pub event_name: String,
    pub workspace_id: Uuid,
    pub events: Vec<DomainEvent>,
    pub jobs: Vec<CallWebhookJobsJobData>,
    pub job_options: JobOptions,
}

impl SideEffects {
    /// Build one event and one webhook job per affected record
    ///
    /// `previous` holds the pre-images for `updated` and `restored`, paired by
    /// id. Records without an id are skipped.
    pub fn collect(
        action: DatabaseEventAction,
        options: &QueryRunnerOptions,
        records: &[Record],
        previous: &[Record],
        updated_fields: Option<Vec<String>>,
        job_options: JobOptions,
    ) -> Self {
        let object = options.object_metadata.as_ref();
        let mut events = Vec::with_capacity(records.len());
        let mut jobs = Vec::with_capacity(records.len());

        for record in records {
            let Some(record_id) = record.id() else {
                tracing::warn!(
                    object = %object.name_singular,
                    action = %action,
                    "skipping side effects of a record without id"
                );
                continue;
            };
            let snapshot = sanitize_snapshot(record);
            let before = || {
                previous
                    .iter()
                    .find(|p| p.id() == Some(record_id))
                    .map(sanitize_snapshot)
            };

            let properties = match action {
                DatabaseEventAction::Created => EventProperties {
                    before: None,
                    after: Some(snapshot.clone()),
                    updated_fields: None,
                },
                DatabaseEventAction::Updated => EventProperties {
                    before: before(),
                    after: Some(snapshot.clone()),
                    updated_fields: updated_fields.clone(),
                },
                DatabaseEventAction::Restored => EventProperties {
                    before: before(),
                    after: Some(snapshot.clone()),
                    updated_fields: None,
                },
                DatabaseEventAction::Deleted | DatabaseEventAction::Destroyed => EventProperties {
                    before: Some(snapshot.clone()),
                    after: None,
                    updated_fields: None,
                },
            };

            events.push(DomainEvent {
                user_id: options.auth_context.user_id,
                record_id,
                object_metadata: object.clone(),
                properties,
            });
            jobs.push(CallWebhookJobsJobData {
                record: snapshot,
                workspace_id: options.auth_context.workspace_id,
                operation: action.into(),
                object_metadata: object.clone(),
            });
        }

        Self {
            event_name: action.event_name(&object.name_singular),
            workspace_id: options.auth_context.workspace_id,
            events,
            jobs,
            job_options,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.jobs.is_empty()
    }

    /// Enqueue the webhook jobs, then emit the event batch
    pub async fn dispatch(self, emitter: &dyn EventEmitter, queue: &dyn JobQueue) {
        if self.is_empty() {
            return;
        }

        for job in self.jobs {
            let record_id = job
                .record
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let payload = match serde_json::to_value(&job) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(record_id, error = %e, "could not serialize webhook job");
                    continue;
                }
            };
            if let Err(e) = queue.add(CALL_WEBHOOK_JOBS_JOB, payload, self.job_options).await {
                tracing::warn!(record_id, error = %e, "could not enqueue webhook job");
            }
        }

        if let Err(e) = emitter
            .emit(&self.event_name, self.events, self.workspace_id)
            .await
        {
            tracing::warn!(event = %self.event_name, error = %e, "could not emit events");
        }
    }
}
