//! Runs a few operations against an in-memory workspace, then optionally
//! serves the same workspace over HTTP.
//!
//! ```text
//! RUST_LOG=query_runner=debug cargo run --example simple_runner
//! cargo run --example simple_runner -- serve
//! ```

use anyhow::{Result, anyhow};
use query_runner::prelude::*;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

const OBJECTS: &str = r#"
objects:
  - nameSingular: company
    namePlural: companies
    duplicateCriteria: [["name"]]
    fields:
      - name: name
        type: TEXT
      - name: employees
        type: NUMBER
      - name: createdAt
        type: DATE_TIME
      - name: updatedAt
        type: DATE_TIME
      - name: people
        type: RELATION
        relation:
          targetObject: person
          kind:
            type: ONE_TO_MANY
            inverseJoinColumn: companyId
  - nameSingular: person
    namePlural: people
    fields:
      - name: name
        type: FULL_NAME
      - name: emails
        type: EMAILS
      - name: companyId
        type: UUID
      - name: company
        type: RELATION
        relation:
          targetObject: company
          kind:
            type: MANY_TO_ONE
            joinColumn: companyId
"#;

fn record(value: Value) -> Result<Record> {
    Record::from_value(value).ok_or_else(|| anyhow!("record must be a JSON object"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🚀 Workspace Query Runner Example\n");

    let workspace_id = Uuid::new_v4();
    let config = RunnerConfig::default();
    let metadata = Arc::new(MetadataConfig::from_yaml_str(OBJECTS)?.into_map());
    let store = InMemoryStore::new();

    // Webhooks: one subscription for every company event
    let queue = Arc::new(InMemoryQueue::new());
    let webhooks = WebhookRegistry::new();
    webhooks.register(workspace_id, Webhook::new("https://hooks.example.com/crm", "company.*"))?;
    let sender = LoggingWebhookSender::new();
    let jobs = webhook_job_registry(
        webhooks,
        queue.clone(),
        Arc::new(sender.clone()),
        JobOptions::with_retry_limit(config.webhook_retry_limit),
    );

    let bus = EventBus::new(config.event_bus_capacity);
    let mut events = Box::pin(bus.workspace_stream(workspace_id));

    let runner = QueryRunner::new(config, Arc::new(bus.clone()), queue.clone());
    let companies = QueryRunnerOptions::new(
        AuthContext::new(workspace_id),
        metadata.clone(),
        "company",
        Arc::new(store.data_source(workspace_id)),
    )?;
    let people = QueryRunnerOptions::new(
        AuthContext::new(workspace_id),
        metadata.clone(),
        "person",
        Arc::new(store.data_source(workspace_id)),
    )?;

    println!("📋 Creating records...\n");

    let acme = runner
        .create_one(
            CreateOneArgs {
                data: record(json!({"name": "Acme", "employees": "12"}))?,
                upsert: false,
            },
            &companies,
        )
        .await?;
    println!("✅ Created company: {}", acme["name"]);

    let acme_id = acme.id().ok_or_else(|| anyhow!("created company has no id"))?;
    runner
        .create_many(
            CreateManyArgs {
                data: vec![
                    record(json!({
                        "name": {"firstName": "Ada", "lastName": "Lovelace"},
                        "emails": {"primaryEmail": "ada@acme.io"},
                        "companyId": acme_id.to_string(),
                    }))?,
                    record(json!({
                        "name": {"firstName": "Alan", "lastName": "Turing"},
                        "emails": {"primaryEmail": "alan@acme.io"},
                        "companyId": acme_id.to_string(),
                    }))?,
                ],
                upsert: false,
            },
            &people,
        )
        .await?;
    println!("✅ Created 2 people");

    println!("\n🔍 Reading company with its people...\n");
    let selection = SelectionTree::from_json(&json!({
        "name": {},
        "employees": {},
        "people": {"name": {}, "emails": {}},
    }))?;
    let page = runner
        .find_many(FindManyArgs::default(), &companies.clone().with_selection(selection))
        .await?;
    println!("{}", serde_json::to_string_pretty(&page)?);

    println!("\n✏️  Update, delete and restore...\n");
    runner
        .update_one(
            UpdateOneArgs {
                id: acme_id.to_string(),
                data: record(json!({"employees": 13}))?,
            },
            &companies,
        )
        .await?;
    runner
        .delete_one(DeleteOneArgs { id: acme_id.to_string() }, &companies)
        .await?;
    let restored = runner
        .restore_many(
            RestoreManyArgs {
                filter: json!({"id": {"eq": acme_id.to_string()}}),
            },
            &companies,
        )
        .await?;
    println!("✅ Restored {} company", restored.len());

    let duplicates = runner
        .find_duplicates(
            FindDuplicatesArgs {
                ids: None,
                data: Some(vec![record(json!({"name": "Acme"}))?]),
            },
            &companies,
        )
        .await?;
    println!("🔁 Duplicates of 'Acme': {}", duplicates[0].total_count);

    println!("\n📣 Events published:\n");
    for _ in 0..5 {
        if let Some(envelope) = events.next().await {
            println!(
                "   {} ({} record(s))",
                envelope.batch.name,
                envelope.batch.events.len()
            );
        }
    }

    let report = queue.work(&jobs).await;
    println!(
        "\n📬 Webhook jobs: {} completed, {} retried, {} failed",
        report.completed, report.retried, report.failed
    );
    for (target, payload) in sender.sent() {
        println!("   {} <- {}", target, payload["eventType"]);
    }

    if std::env::args().any(|arg| arg == "serve") {
        println!("\n🌐 Serving workspace {} on http://127.0.0.1:3000", workspace_id);
        ServerBuilder::new()
            .with_data_source_provider(store)
            .register_workspace(workspace_id, MetadataConfig::from_yaml_str(OBJECTS)?.into_map())
            .with_job_queue(queue)
            .serve("127.0.0.1:3000")
            .await?;
    }

    Ok(())
}
