//! End-to-end tests of the query runner over an in-memory workspace
//!
//! These tests verify that:
//! - Every operation kind reads and writes the expected records
//! - Mutations publish one event and one webhook job per affected record
//! - Soft delete, restore and destroy behave as a lifecycle
//! - Selections load relations and shape results as connections

mod harness;

use harness::*;
use query_runner::prelude::*;
use query_runner::runner::CALL_WEBHOOK_JOBS_JOB;

// =============================================================================
// createMany
// =============================================================================

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_many_emits_one_event_and_job_per_record() {
        let ws = TestWorkspace::new();
        let mut events = ws.subscribe();

        let created = ws
            .create_people(vec![
                person("Ada", "Lovelace", "ada@acme.io"),
                person("Alan", "Turing", "alan@acme.io"),
                person("Grace", "Hopper", "grace@acme.io"),
            ])
            .await;
        assert_eq!(created.len(), 3);

        let envelopes = drain(&mut events);
        assert_eq!(envelopes.len(), 1);
        let batch = &envelopes[0].batch;
        assert_eq!(batch.name, "person.created");
        assert_eq!(batch.workspace_id, ws.workspace_id);
        assert_eq!(batch.events.len(), 3);

        let jobs = ws.queue.pending_named(CALL_WEBHOOK_JOBS_JOB);
        assert_eq!(jobs.len(), 3);

        for (record, (event, job)) in created.iter().zip(batch.events.iter().zip(&jobs)) {
            let id = id_of(record);
            assert_eq!(event.record_id, id);
            assert_eq!(event.user_id, Some(ws.user_id));
            assert_eq!(job.payload["record"]["id"], id.to_string());
            assert_eq!(job.payload["operation"], "create");
            assert_eq!(job.payload["workspaceId"], ws.workspace_id.to_string());
            assert_eq!(job.options.retry_limit, 3);
        }
    }

    #[tokio::test]
    async fn test_created_event_has_no_before() {
        let ws = TestWorkspace::new();
        let mut events = ws.subscribe();

        let acme = ws.create_company("Acme").await;

        let envelopes = drain(&mut events);
        let event = &envelopes[0].batch.events[0];
        assert_eq!(envelopes[0].batch.name, "company.created");
        assert!(event.properties.before.is_none());
        let after = event.properties.after.as_ref().unwrap();
        assert_eq!(after["name"], "Acme");
        assert_eq!(after["id"], acme["id"]);
        assert!(after.get("__typename").is_none());
    }

    #[tokio::test]
    async fn test_create_fills_defaults() {
        let ws = TestWorkspace::new();
        let company = ws
            .runner
            .create_one(
                CreateOneArgs {
                    data: record(json!({"name": "Acme", "employees": "42"})),
                    upsert: false,
                },
                &ws.options("company"),
            )
            .await
            .unwrap();

        assert!(company.id().is_some());
        assert_eq!(company["employees"], 42);
        assert!(company["createdAt"].is_string());
        assert!(company["updatedAt"].is_string());
        assert_eq!(company["__typename"], "Company");
    }

    #[tokio::test]
    async fn test_create_keeps_given_id_and_nests_composites() {
        let ws = TestWorkspace::new();
        let id = Uuid::new_v4();
        let mut ada = person("Ada", "Lovelace", "ada@acme.io");
        ada.set("id", json!(id.to_string()));

        let created = ws.create_people(vec![ada]).await;

        assert_eq!(id_of(&created[0]), id);
        assert_eq!(created[0]["name"]["firstName"], "Ada");
        assert_eq!(created[0]["emails"]["primaryEmail"], "ada@acme.io");

        let rows = ws.store.rows(ws.workspace_id, "person").unwrap();
        assert_eq!(rows[0]["nameLastName"], "Lovelace");
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_record() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;

        let upserted = ws
            .runner
            .create_many(
                CreateManyArgs {
                    data: vec![record(json!({"id": acme["id"], "name": "Acme Inc"}))],
                    upsert: true,
                },
                &ws.options("company"),
            )
            .await
            .unwrap();

        assert_eq!(id_of(&upserted[0]), id_of(&acme));
        assert_eq!(upserted[0]["name"], "Acme Inc");
        assert_eq!(ws.store.rows(ws.workspace_id, "company").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_timestamps() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let upsert = |name: &str| CreateManyArgs {
            data: vec![record(json!({"id": acme["id"], "name": name}))],
            upsert: true,
        };

        let unchanged = ws
            .runner
            .create_many(upsert("Acme"), &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(unchanged[0]["createdAt"], acme["createdAt"]);
        assert_eq!(unchanged[0]["updatedAt"], acme["updatedAt"]);

        let renamed = ws
            .runner
            .create_many(upsert("Acme Inc"), &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(renamed[0]["name"], "Acme Inc");
        assert_eq!(renamed[0]["createdAt"], acme["createdAt"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_storage_error() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;

        let err = ws
            .runner
            .create_many(
                CreateManyArgs {
                    data: vec![record(json!({"id": acme["id"], "name": "Again"}))],
                    upsert: false,
                },
                &ws.options("company"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueryRunnerError::Storage { .. }));
    }
}

// =============================================================================
// updateOne / updateMany
// =============================================================================

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_one_event_carries_both_snapshots() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let mut events = ws.subscribe();

        let updated = ws
            .runner
            .update_one(
                UpdateOneArgs {
                    id: id_of(&acme).to_string(),
                    data: record(json!({"name": "Acme Inc"})),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();
        assert_eq!(updated["name"], "Acme Inc");

        let envelopes = drain(&mut events);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].batch.name, "company.updated");
        let properties = &envelopes[0].batch.events[0].properties;
        assert_eq!(properties.before.as_ref().unwrap()["name"], "Acme");
        assert_eq!(properties.after.as_ref().unwrap()["name"], "Acme Inc");
        assert_eq!(properties.updated_fields, Some(vec!["name".to_string()]));
    }

    #[tokio::test]
    async fn test_update_one_missing_record() {
        let ws = TestWorkspace::new();
        let mut events = ws.subscribe();

        let err = ws
            .runner
            .update_one(
                UpdateOneArgs {
                    id: Uuid::new_v4().to_string(),
                    data: record(json!({"name": "Ghost"})),
                },
                &ws.options("company"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, QueryRunnerError::RecordNotFound { .. }));
        assert!(drain(&mut events).is_empty());
        assert!(ws.queue.is_empty());
    }

    #[tokio::test]
    async fn test_update_many_pairs_each_pre_image() {
        let ws = TestWorkspace::new();
        let people = ws
            .create_people(vec![
                person("Ada", "Lovelace", "ada@acme.io"),
                person("Alan", "Turing", "alan@acme.io"),
                person("Grace", "Hopper", "grace@acme.io"),
            ])
            .await;
        let mut events = ws.subscribe();

        let updated = ws
            .runner
            .update_many(
                UpdateManyArgs {
                    filter: json!({}),
                    data: record(json!({"city": "London"})),
                },
                &ws.options("person"),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 3);

        let envelopes = drain(&mut events);
        let batch = &envelopes[0].batch;
        assert_eq!(batch.name, "person.updated");
        assert_eq!(batch.events.len(), 3);

        for event in &batch.events {
            let original = people
                .iter()
                .find(|p| id_of(p) == event.record_id)
                .unwrap();
            let before = event.properties.before.as_ref().unwrap();
            let after = event.properties.after.as_ref().unwrap();
            assert_eq!(before["id"], original["id"]);
            assert_eq!(before["name"], original["name"]);
            assert!(before.get("city").is_none_or(Value::is_null));
            assert_eq!(after["city"], "London");
        }
        assert_eq!(ws.queue.pending_named(CALL_WEBHOOK_JOBS_JOB).len(), 6);
    }

    #[tokio::test]
    async fn test_update_many_skips_soft_deleted() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        ws.create_company("Globex").await;
        ws.runner
            .delete_one(
                DeleteOneArgs {
                    id: id_of(&acme).to_string(),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();

        let updated = ws
            .runner
            .update_many(
                UpdateManyArgs {
                    filter: json!({}),
                    data: record(json!({"employees": 10})),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["name"], "Globex");
    }
}

// =============================================================================
// deleteOne / deleteMany / restoreMany / destroyOne
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_one_twice_keeps_record_deleted() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let args = DeleteOneArgs {
            id: id_of(&acme).to_string(),
        };

        let first = ws
            .runner
            .delete_one(args.clone(), &ws.options("company"))
            .await
            .unwrap();
        assert!(first["deletedAt"].is_string());

        let second = ws
            .runner
            .delete_one(args, &ws.options("company"))
            .await
            .unwrap();
        assert!(second["deletedAt"].is_string());

        let page = ws
            .runner
            .find_many(FindManyArgs::default(), &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn test_deleted_event_has_no_after() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let mut events = ws.subscribe();

        ws.runner
            .delete_one(
                DeleteOneArgs {
                    id: id_of(&acme).to_string(),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();

        let envelopes = drain(&mut events);
        assert_eq!(envelopes[0].batch.name, "company.deleted");
        let properties = &envelopes[0].batch.events[0].properties;
        assert!(properties.before.as_ref().unwrap()["deletedAt"].is_string());
        assert!(properties.after.is_none());
        assert_eq!(ws.queue.pending_named(CALL_WEBHOOK_JOBS_JOB)[1].payload["operation"], "delete");
    }

    #[tokio::test]
    async fn test_restore_then_delete_round_trip() {
        let ws = TestWorkspace::new();
        ws.create_company("Acme").await;
        let filter = json!({"name": {"eq": "Acme"}});

        let deleted = ws
            .runner
            .delete_many(
                DeleteManyArgs {
                    filter: filter.clone(),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);

        let mut events = ws.subscribe();
        let restored = ws
            .runner
            .restore_many(
                RestoreManyArgs {
                    filter: filter.clone(),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();
        assert_eq!(restored.len(), 1);
        assert!(restored[0]["deletedAt"].is_null());

        let envelopes = drain(&mut events);
        assert_eq!(envelopes[0].batch.name, "company.restored");
        let properties = &envelopes[0].batch.events[0].properties;
        assert!(properties.before.as_ref().unwrap()["deletedAt"].is_string());
        assert!(properties.after.as_ref().unwrap()["deletedAt"].is_null());

        let deleted_again = ws
            .runner
            .delete_many(DeleteManyArgs { filter }, &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(deleted_again.len(), 1);
        assert!(deleted_again[0]["deletedAt"].is_string());

        let mut before = deleted[0].clone();
        let mut after = deleted_again[0].clone();
        for record in [&mut before, &mut after] {
            record.remove("deletedAt");
            record.remove("updatedAt");
        }
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_restore_ignores_live_records() {
        let ws = TestWorkspace::new();
        ws.create_company("Acme").await;
        let mut events = ws.subscribe();

        let restored = ws
            .runner
            .restore_many(
                RestoreManyArgs { filter: json!({}) },
                &ws.options("company"),
            )
            .await
            .unwrap();

        assert!(restored.is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_destroy_one_returns_snapshot() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let args = DestroyOneArgs {
            id: id_of(&acme).to_string(),
        };
        let mut events = ws.subscribe();

        let destroyed = ws
            .runner
            .destroy_one(args.clone(), &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(destroyed, acme);
        assert!(ws.store.rows(ws.workspace_id, "company").unwrap().is_empty());

        let envelopes = drain(&mut events);
        assert_eq!(envelopes[0].batch.name, "company.destroyed");
        assert_eq!(
            envelopes[0].batch.events[0].properties.before.as_ref().unwrap()["name"],
            "Acme"
        );

        let err = ws
            .runner
            .destroy_one(args, &ws.options("company"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryRunnerError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_destroy_soft_deleted_record() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let id = id_of(&acme).to_string();
        ws.runner
            .delete_one(DeleteOneArgs { id: id.clone() }, &ws.options("company"))
            .await
            .unwrap();

        let destroyed = ws
            .runner
            .destroy_one(DestroyOneArgs { id }, &ws.options("company"))
            .await
            .unwrap();
        assert!(destroyed["deletedAt"].is_string());
    }
}

// =============================================================================
// Reads
// =============================================================================

mod read_tests {
    use super::*;

    #[tokio::test]
    async fn test_find_one_by_filter() {
        let ws = TestWorkspace::new();
        ws.create_company("Acme").await;
        ws.create_company("Globex").await;

        let found = ws
            .runner
            .find_one(
                FindOneArgs {
                    filter: json!({"name": {"eq": "Globex"}}),
                },
                &ws.options("company"),
            )
            .await
            .unwrap();
        assert_eq!(found["name"], "Globex");

        let err = ws
            .runner
            .find_one(
                FindOneArgs {
                    filter: json!({"name": {"eq": "Initech"}}),
                },
                &ws.options("company"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueryRunnerError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_one_requires_filter() {
        let ws = TestWorkspace::new();
        let err = ws
            .runner
            .find_one(FindOneArgs { filter: json!({}) }, &ws.options("company"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryRunnerError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_find_many_paginates_in_order() {
        let ws = TestWorkspace::new();
        for name in ["Cyberdyne", "Acme", "Globex"] {
            ws.create_company(name).await;
        }
        let options = ws.options("company");

        let first = ws
            .runner
            .find_many(
                FindManyArgs {
                    order_by: json!({"name": "AscNullsLast"}),
                    pagination: PaginationArgs {
                        first: Some(2),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                &options,
            )
            .await
            .unwrap();

        let names: Vec<&Value> = first.nodes().map(|n| &n["name"]).collect();
        assert_eq!(names, vec!["Acme", "Cyberdyne"]);
        assert_eq!(first.total_count, 3);
        assert!(first.page_info.has_next_page);

        let second = ws
            .runner
            .find_many(
                FindManyArgs {
                    order_by: json!({"name": "AscNullsLast"}),
                    pagination: PaginationArgs {
                        first: Some(2),
                        after: first.page_info.end_cursor.clone(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                &options,
            )
            .await
            .unwrap();

        assert_eq!(second.edges.len(), 1);
        assert_eq!(second.edges[0].node["name"], "Globex");
        assert!(!second.page_info.has_next_page);
        assert!(second.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_find_many_filters_on_composite_sub_field() {
        let ws = TestWorkspace::new();
        ws.create_people(vec![
            person("Ada", "Lovelace", "ada@acme.io"),
            person("Alan", "Turing", "alan@acme.io"),
        ])
        .await;

        let page = ws
            .runner
            .find_many(
                FindManyArgs {
                    filter: json!({"name": {"firstName": {"like": "Al%"}}}),
                    ..Default::default()
                },
                &ws.options("person"),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.edges[0].node["name"]["lastName"], "Turing");
    }

    #[tokio::test]
    async fn test_selection_loads_relations_as_connections() {
        let ws = TestWorkspace::new();
        let acme = ws.create_company("Acme").await;
        let mut ada = person("Ada", "Lovelace", "ada@acme.io");
        ada.set("companyId", acme["id"].clone());
        ws.create_people(vec![ada]).await;

        let options = ws.options_selecting(
            "company",
            json!({"name": {}, "people": {"edges": {"node": {"name": {"firstName": {}}}}}}),
        );
        let page = ws
            .runner
            .find_many(FindManyArgs::default(), &options)
            .await
            .unwrap();

        let company = &page.edges[0].node;
        assert_eq!(company["name"], "Acme");
        assert!(company.get("employees").is_none());
        assert_eq!(company["people"]["totalCount"], 1);
        let node = &company["people"]["edges"][0]["node"];
        assert_eq!(node["__typename"], "Person");
        assert_eq!(node["name"]["firstName"], "Ada");

        let options = ws.options_selecting("person", json!({"company": {"name": {}}}));
        let page = ws
            .runner
            .find_many(FindManyArgs::default(), &options)
            .await
            .unwrap();
        assert_eq!(page.edges[0].node["company"]["name"], "Acme");
        assert_eq!(page.edges[0].node["company"]["__typename"], "Company");
    }

    #[tokio::test]
    async fn test_find_duplicates_by_data_and_ids() {
        let ws = TestWorkspace::new();
        let people = ws
            .create_people(vec![
                person("Ada", "Lovelace", "ada@acme.io"),
                person("Ada", "Lovelace", "countess@acme.io"),
                person("Alan", "Turing", "alan@acme.io"),
            ])
            .await;

        let by_data = ws
            .runner
            .find_duplicates(
                FindDuplicatesArgs {
                    ids: None,
                    data: Some(vec![
                        person("Someone", "Else", "alan@acme.io"),
                        person("Nobody", "", ""),
                    ]),
                },
                &ws.options("person"),
            )
            .await
            .unwrap();
        assert_eq!(by_data.len(), 2);
        assert_eq!(by_data[0].total_count, 1);
        assert_eq!(by_data[0].edges[0].node["name"]["firstName"], "Alan");
        assert_eq!(by_data[1].total_count, 0);

        let by_ids = ws
            .runner
            .find_duplicates(
                FindDuplicatesArgs {
                    ids: Some(vec![id_of(&people[0]).to_string()]),
                    data: None,
                },
                &ws.options("person"),
            )
            .await
            .unwrap();
        assert_eq!(by_ids.len(), 1);
        assert_eq!(by_ids[0].total_count, 1);
        assert_eq!(by_ids[0].edges[0].node["id"], people[1]["id"]);
    }

    #[tokio::test]
    async fn test_workspaces_are_isolated() {
        let ws = TestWorkspace::new();
        ws.create_company("Acme").await;

        let other = Uuid::new_v4();
        let options = QueryRunnerOptions::new(
            AuthContext::new(other),
            ws.metadata.clone(),
            "company",
            Arc::new(ws.store.data_source(other)),
        )
        .unwrap();

        let page = ws
            .runner
            .find_many(FindManyArgs::default(), &options)
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }
}

// =============================================================================
// Hooks
// =============================================================================

mod hook_tests {
    use super::*;

    #[tokio::test]
    async fn test_pre_hook_rewrites_arguments() {
        let mut hooks = HookRegistry::new();
        hooks.register_pre(
            "company.createMany",
            FnPreQueryHook::new("default-employees", |_, op| {
                Box::pin(async move {
                    let Operation::CreateMany(mut args) = op else {
                        return Ok(op);
                    };
                    for record in &mut args.data {
                        record.set("employees", json!(1));
                    }
                    Ok(Operation::CreateMany(args))
                })
            }),
        );
        let ws = TestWorkspace::with_hooks(hooks);

        let acme = ws.create_company("Acme").await;
        assert_eq!(acme["employees"], 1);
    }

    #[tokio::test]
    async fn test_rejecting_pre_hook_prevents_write() {
        let mut hooks = HookRegistry::new();
        hooks.register_pre(
            "*.deleteOne",
            FnPreQueryHook::new("no-deletes", |_, _| {
                Box::pin(async { Err(anyhow::anyhow!("deletes are disabled")) })
            }),
        );
        let ws = TestWorkspace::with_hooks(hooks);
        let acme = ws.create_company("Acme").await;
        let mut events = ws.subscribe();

        let err = ws
            .runner
            .delete_one(
                DeleteOneArgs {
                    id: id_of(&acme).to_string(),
                },
                &ws.options("company"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, QueryRunnerError::HookRejected { ref hook, .. } if hook == "no-deletes"));
        assert!(drain(&mut events).is_empty());
        let rows = ws.store.rows(ws.workspace_id, "company").unwrap();
        assert!(rows[0].get("deletedAt").is_none_or(Value::is_null));
    }

    #[tokio::test]
    async fn test_post_hook_sees_connection_nodes() {
        let mut hooks = HookRegistry::new();
        hooks.register_post(
            "company.findMany",
            FnPostQueryHook::new("redact", |_, _, mut records| {
                Box::pin(async move {
                    for record in &mut records {
                        record.set("name", json!("[redacted]"));
                    }
                    Ok(records)
                })
            }),
        );
        let ws = TestWorkspace::with_hooks(hooks);
        ws.create_company("Acme").await;

        let page = ws
            .runner
            .find_many(FindManyArgs::default(), &ws.options("company"))
            .await
            .unwrap();
        assert_eq!(page.edges[0].node["name"], "[redacted]");
    }
}
