//! Tests for loading runner and metadata configuration from files

mod harness;

use harness::*;
use query_runner::core::ConfigError;
use query_runner::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const OBJECTS_YAML: &str = r#"
objects:
  - nameSingular: company
    namePlural: companies
    duplicateCriteria: [["name"]]
    fields:
      - name: name
        type: TEXT
      - name: employees
        type: NUMBER
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
      - name: companyId
        type: UUID
      - name: company
        type: RELATION
        relation:
          targetObject: company
          kind:
            type: MANY_TO_ONE
            joinColumn: companyId
  - nameSingular: invoice
    isRemote: true
    fields:
      - name: amount
        type: NUMBER
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_runner_config_from_file() {
    let file = write_temp("webhook_retry_limit: 5\nmax_page_size: 50\ndefault_page_size: 10\n");
    let config = RunnerConfig::from_yaml_file(file.path()).unwrap();

    assert_eq!(config.webhook_retry_limit, 5);
    assert_eq!(config.max_page_size, 50);
    assert_eq!(config.default_page_size, 10);
    assert_eq!(config.event_bus_capacity, 1024);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = RunnerConfig::from_yaml_file("/nonexistent/runner.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("runner.yaml")));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let file = write_temp("max_page_size: [not, a, number]");
    let err = RunnerConfig::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_metadata_from_file() {
    let file = write_temp(OBJECTS_YAML);
    let map = MetadataConfig::from_yaml_file(file.path()).unwrap().into_map();

    assert_eq!(map.len(), 3);
    assert!(map.get_or_throw("invoice").unwrap().is_remote);
    let company = map.get_or_throw("company").unwrap();
    assert_eq!(company.duplicate_criteria, vec![vec!["name".to_string()]]);
}

#[test]
fn test_duplicate_object_names_rejected() {
    let yaml = r#"
objects:
  - nameSingular: company
    fields: []
  - nameSingular: company
    fields: []
"#;
    let err = MetadataConfig::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[tokio::test]
async fn test_loaded_config_drives_the_runner() {
    let config_file = write_temp("default_page_size: 2\nmax_page_size: 3\nwebhook_retry_limit: 7\n");
    let objects_file = write_temp(OBJECTS_YAML);

    let config = RunnerConfig::from_yaml_file(config_file.path()).unwrap();
    let metadata = Arc::new(
        MetadataConfig::from_yaml_file(objects_file.path())
            .unwrap()
            .into_map(),
    );

    let ws = TestWorkspace::with_config(config, HookRegistry::new());
    let options = QueryRunnerOptions::new(
        AuthContext::new(ws.workspace_id),
        metadata,
        "company",
        Arc::new(ws.store.data_source(ws.workspace_id)),
    )
    .unwrap();

    let created = ws
        .runner
        .create_many(
            CreateManyArgs {
                data: ["Acme", "Globex", "Initech", "Umbrella"]
                    .into_iter()
                    .map(|name| record(json!({"name": name})))
                    .collect(),
                upsert: false,
            },
            &options,
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 4);

    let default_page = ws
        .runner
        .find_many(FindManyArgs::default(), &options)
        .await
        .unwrap();
    assert_eq!(default_page.edges.len(), 2);
    assert_eq!(default_page.total_count, 4);

    let capped = ws
        .runner
        .find_many(
            FindManyArgs {
                pagination: PaginationArgs {
                    first: Some(100),
                    ..Default::default()
                },
                ..Default::default()
            },
            &options,
        )
        .await
        .unwrap();
    assert_eq!(capped.edges.len(), 3);

    let jobs = ws.queue.pending();
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|job| job.options.retry_limit == 7));
}
