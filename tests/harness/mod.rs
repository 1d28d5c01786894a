//! Shared test harness for query runner integration tests
//!
//! Provides a `company`/`person` workspace on an in-memory store, a runner
//! wired to an event bus and an in-memory queue, and record helpers.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod harness;
//! use harness::*;
//! ```

#![allow(dead_code)]

use query_runner::prelude::*;
use query_runner::storage::InMemoryStore;
use tokio::sync::broadcast;

pub use query_runner::core::events::EventEnvelope;

pub fn company_metadata() -> ObjectMetadata {
    ObjectMetadata::new(
        "company",
        vec![
            FieldMetadata::new("id", FieldMetadataType::Uuid),
            FieldMetadata::new("name", FieldMetadataType::Text),
            FieldMetadata::new("employees", FieldMetadataType::Number),
            FieldMetadata::new("createdAt", FieldMetadataType::DateTime),
            FieldMetadata::new("updatedAt", FieldMetadataType::DateTime),
            FieldMetadata::new("deletedAt", FieldMetadataType::DateTime),
            FieldMetadata::one_to_many("people", "person", "companyId"),
        ],
    )
    .with_duplicate_criteria(vec![vec!["name"]])
}

pub fn person_metadata() -> ObjectMetadata {
    let mut person = ObjectMetadata::new(
        "person",
        vec![
            FieldMetadata::new("id", FieldMetadataType::Uuid),
            FieldMetadata::new("name", FieldMetadataType::FullName),
            FieldMetadata::new("emails", FieldMetadataType::Emails),
            FieldMetadata::new("city", FieldMetadataType::Text),
            FieldMetadata::new("companyId", FieldMetadataType::Uuid),
            FieldMetadata::many_to_one("company", "company", "companyId"),
        ],
    )
    .with_duplicate_criteria(vec![
        vec!["nameFirstName", "nameLastName"],
        vec!["emailsPrimaryEmail"],
    ]);
    person.name_plural = "people".to_string();
    person
}

/// Read-only object proxied from another system
pub fn invoice_metadata() -> ObjectMetadata {
    ObjectMetadata::new(
        "invoice",
        vec![FieldMetadata::new("amount", FieldMetadataType::Number)],
    )
    .remote()
}

pub fn metadata_map() -> Arc<ObjectMetadataMap> {
    Arc::new(ObjectMetadataMap::from_collection(vec![
        company_metadata(),
        person_metadata(),
        invoice_metadata(),
    ]))
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("record must be a JSON object")
}

pub fn person(first: &str, last: &str, email: &str) -> Record {
    record(json!({
        "name": {"firstName": first, "lastName": last},
        "emails": {"primaryEmail": email},
    }))
}

/// One workspace, one runner, and handles on everything it talks to
pub struct TestWorkspace {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub store: InMemoryStore,
    pub metadata: Arc<ObjectMetadataMap>,
    pub bus: EventBus,
    pub queue: Arc<InMemoryQueue>,
    pub runner: QueryRunner,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self::with_hooks(HookRegistry::new())
    }

    pub fn with_hooks(hooks: HookRegistry) -> Self {
        Self::with_config(RunnerConfig::default(), hooks)
    }

    pub fn with_config(config: RunnerConfig, hooks: HookRegistry) -> Self {
        let bus = EventBus::new(64);
        let queue = Arc::new(InMemoryQueue::new());
        let runner = QueryRunner::new(config, Arc::new(bus.clone()), queue.clone()).with_hooks(hooks);
        Self {
            workspace_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            store: InMemoryStore::new(),
            metadata: metadata_map(),
            bus,
            queue,
            runner,
        }
    }

    pub fn options(&self, object: &str) -> QueryRunnerOptions {
        QueryRunnerOptions::new(
            AuthContext::new(self.workspace_id).with_user(self.user_id),
            self.metadata.clone(),
            object,
            Arc::new(self.store.data_source(self.workspace_id)),
        )
        .expect("object is declared")
    }

    pub fn options_selecting(&self, object: &str, selection: Value) -> QueryRunnerOptions {
        self.options(object)
            .with_selection(SelectionTree::from_json(&selection).expect("valid selection"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe()
    }

    pub async fn create_company(&self, name: &str) -> Record {
        self.runner
            .create_one(
                CreateOneArgs {
                    data: record(json!({"name": name})),
                    upsert: false,
                },
                &self.options("company"),
            )
            .await
            .expect("company created")
    }

    pub async fn create_people(&self, people: Vec<Record>) -> Vec<Record> {
        self.runner
            .create_many(
                CreateManyArgs {
                    data: people,
                    upsert: false,
                },
                &self.options("person"),
            )
            .await
            .expect("people created")
    }
}

pub fn id_of(record: &Record) -> Uuid {
    record.id().expect("record has an id")
}

/// Every envelope already published on `receiver`
pub fn drain(receiver: &mut broadcast::Receiver<EventEnvelope>) -> Vec<EventEnvelope> {
    let mut envelopes = Vec::new();
    while let Ok(envelope) = receiver.try_recv() {
        envelopes.push(envelope);
    }
    envelopes
}
