//! In-memory record storage for testing and development
//!
//! Tables are kept per workspace and per object in insertion order. Uses
//! RwLock for thread-safe access.

use crate::core::filter::{OrderBy, RecordFilter, matches, references_deleted_at, values_equal};
use crate::core::metadata::RelationKind;
use crate::core::record::{CREATED_AT_FIELD, ID_FIELD, Record, UPDATED_AT_FIELD};
use crate::core::selection::RelationDirective;
use crate::core::service::{
    DataSourceProvider, FindOptions, RecordRepository, UpdateCriteria, UpsertOptions,
    WorkspaceDataSource,
};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type Table = IndexMap<Uuid, Record>;
type Tables = HashMap<String, Table>;

/// Shared in-memory store holding every workspace
#[derive(Clone, Default)]
pub struct InMemoryStore {
    workspaces: Arc<RwLock<HashMap<Uuid, Tables>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tenant-scoped handle on this store
    pub fn data_source(&self, workspace_id: Uuid) -> InMemoryDataSource {
        InMemoryDataSource {
            store: self.clone(),
            workspace_id,
        }
    }

    /// Raw rows of one object, soft-deleted ones included
    pub fn rows(&self, workspace_id: Uuid, object_name: &str) -> Result<Vec<Record>> {
        let workspaces = self
            .workspaces
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(workspaces
            .get(&workspace_id)
            .and_then(|tables| tables.get(object_name))
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl DataSourceProvider for InMemoryStore {
    fn data_source(&self, workspace_id: Uuid) -> Arc<dyn WorkspaceDataSource> {
        Arc::new(InMemoryStore::data_source(self, workspace_id))
    }
}

/// Data source for one workspace of an [`InMemoryStore`]
#[derive(Clone)]
pub struct InMemoryDataSource {
    store: InMemoryStore,
    workspace_id: Uuid,
}

impl WorkspaceDataSource for InMemoryDataSource {
    fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }

    fn repository(&self, object_name: &str) -> Arc<dyn RecordRepository> {
        Arc::new(InMemoryRepository {
            store: self.store.clone(),
            workspace_id: self.workspace_id,
            object_name: object_name.to_string(),
        })
    }
}

/// Repository over one table of an [`InMemoryStore`]
pub struct InMemoryRepository {
    store: InMemoryStore,
    workspace_id: Uuid,
    object_name: String,
}

impl InMemoryRepository {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        let workspaces = self
            .store
            .workspaces
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let empty = Tables::new();
        f(workspaces.get(&self.workspace_id).unwrap_or(&empty))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut workspaces = self
            .store
            .workspaces
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let table = workspaces
            .entry(self.workspace_id)
            .or_default()
            .entry(self.object_name.clone())
            .or_default();
        f(table)
    }
}

fn record_id(record: &Record) -> Result<Uuid> {
    record
        .id()
        .ok_or_else(|| anyhow!("Record is missing a valid '{}'", ID_FIELD))
}

fn is_visible(row: &Record, filter: &RecordFilter, with_deleted: bool) -> Result<bool> {
    if !with_deleted && !references_deleted_at(filter) && row.is_soft_deleted() {
        return Ok(false);
    }
    Ok(matches(row, filter)?)
}

fn merge(row: &mut Record, data: &Record) {
    for (key, value) in data.iter() {
        if key != ID_FIELD {
            row.set(key.clone(), value.clone());
        }
    }
}

/// Apply an upsert onto the row it conflicts with
///
/// `createdAt` keeps the row's value. With `skip_unchanged`, a row whose
/// values differ only in write timestamps is left as is.
fn merge_conflicting(row: &mut Record, data: &Record, skip_unchanged: bool) {
    let changed = data.iter().any(|(key, value)| {
        key != ID_FIELD
            && key != CREATED_AT_FIELD
            && key != UPDATED_AT_FIELD
            && row.get(key) != Some(value)
    });
    if skip_unchanged && !changed {
        return;
    }
    for (key, value) in data.iter() {
        if key != ID_FIELD && key != CREATED_AT_FIELD {
            row.set(key.clone(), value.clone());
        }
    }
}

fn project(row: &Record, select: &BTreeSet<String>) -> Record {
    if select.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(key, _)| select.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Attach the requested relations to a projected row
fn load_relations(
    tables: &Tables,
    source: &Record,
    target: &mut Record,
    relations: &BTreeMap<String, RelationDirective>,
) {
    for (name, relation) in relations {
        let table = tables.get(&relation.target_object);
        let nested = |row: &Record| {
            let mut loaded = project(row, &relation.directives.select);
            load_relations(tables, row, &mut loaded, &relation.directives.relations);
            loaded.into_value()
        };

        let value = match &relation.kind {
            RelationKind::ManyToOne { join_column } => source
                .get(join_column)
                .and_then(Value::as_str)
                .and_then(|id| Uuid::parse_str(id).ok())
                .and_then(|id| table.and_then(|t| t.get(&id)))
                .filter(|row| !row.is_soft_deleted())
                .map(nested)
                .unwrap_or(Value::Null),
            RelationKind::OneToMany {
                inverse_join_column,
            } => {
                let own_id = source.get(ID_FIELD).cloned().unwrap_or(Value::Null);
                Value::Array(
                    table
                        .map(|t| {
                            t.values()
                                .filter(|row| !row.is_soft_deleted())
                                .filter(|row| {
                                    row.get(inverse_join_column)
                                        .is_some_and(|v| values_equal(v, &own_id))
                                })
                                .map(nested)
                                .collect()
                        })
                        .unwrap_or_default(),
                )
            }
        };
        target.set(name.clone(), value);
    }
}

fn sorted(mut rows: Vec<Record>, order_by: &OrderBy) -> Vec<Record> {
    if !order_by.is_empty() {
        rows.sort_by(|a, b| order_by.compare(a, b));
    }
    rows
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    async fn insert(&self, records: Vec<Record>) -> Result<Vec<Uuid>> {
        self.write(|table| {
            let ids = records
                .iter()
                .map(record_id)
                .collect::<Result<Vec<_>>>()?;
            if let Some(duplicate) = ids.iter().find(|id| table.contains_key(*id)) {
                bail!(
                    "Duplicate key value violates unique constraint on '{}': {}",
                    ID_FIELD,
                    duplicate
                );
            }
            for (id, record) in ids.iter().zip(records) {
                table.insert(*id, record);
            }
            Ok(ids)
        })
    }

    async fn upsert(&self, records: Vec<Record>, options: UpsertOptions) -> Result<Vec<Uuid>> {
        self.write(|table| {
            let mut ids = Vec::with_capacity(records.len());
            for record in records {
                let existing = table.values_mut().find(|row| {
                    options.conflict_paths.iter().all(|path| {
                        match (row.get(path), record.get(path)) {
                            (Some(left), Some(right)) => values_equal(left, right),
                            _ => false,
                        }
                    })
                });

                match existing {
                    Some(row) => {
                        ids.push(record_id(row)?);
                        merge_conflicting(row, &record, options.skip_update_if_no_values_changed);
                    }
                    None => {
                        let id = record_id(&record)?;
                        table.insert(id, record);
                        ids.push(id);
                    }
                }
            }
            Ok(ids)
        })
    }

    async fn find(&self, options: FindOptions) -> Result<Vec<Record>> {
        self.read(|tables| {
            let Some(table) = tables.get(&self.object_name) else {
                return Ok(Vec::new());
            };

            let mut rows = Vec::new();
            for row in table.values() {
                if is_visible(row, &options.filter, options.with_deleted)? {
                    rows.push(row.clone());
                }
            }

            Ok(sorted(rows, &options.order_by)
                .iter()
                .map(|row| {
                    let mut projected = project(row, &options.select);
                    load_relations(tables, row, &mut projected, &options.relations);
                    projected
                })
                .collect())
        })
    }

    async fn find_one(&self, filter: RecordFilter, with_deleted: bool) -> Result<Option<Record>> {
        let mut options = FindOptions::filtered(filter);
        options.with_deleted = with_deleted;
        Ok(self.find(options).await?.into_iter().next())
    }

    async fn update(&self, criteria: UpdateCriteria, data: Record) -> Result<Vec<Uuid>> {
        self.write(|table| {
            let mut ids = Vec::new();
            for (id, row) in table.iter() {
                if is_visible(row, &criteria.filter, criteria.with_deleted)? {
                    ids.push(*id);
                }
            }
            for id in &ids {
                if let Some(row) = table.get_mut(id) {
                    merge(row, &data);
                }
            }
            Ok(ids)
        })
    }

    async fn delete(&self, id: &Uuid) -> Result<usize> {
        self.write(|table| Ok(usize::from(table.shift_remove(id).is_some())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::id_filter;
    use crate::core::selection::SelectDirectives;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn company(name: &str) -> (Uuid, Record) {
        let id = Uuid::new_v4();
        (id, record(json!({"id": id.to_string(), "name": name, "deletedAt": null})))
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (id, acme) = company("Acme");

        assert_eq!(repo.insert(vec![acme.clone()]).await.unwrap(), vec![id]);
        assert!(repo.insert(vec![acme]).await.is_err());

        let found = repo.find_one(id_filter(&id), false).await.unwrap().unwrap();
        assert_eq!(found["name"], "Acme");
    }

    #[tokio::test]
    async fn test_workspaces_are_isolated() {
        let store = InMemoryStore::new();
        let (_, acme) = company("Acme");
        store
            .data_source(Uuid::new_v4())
            .repository("company")
            .insert(vec![acme])
            .await
            .unwrap();

        let other = store.data_source(Uuid::new_v4()).repository("company");
        assert!(other.find(FindOptions::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_hidden_unless_requested() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (id, acme) = company("Acme");
        repo.insert(vec![acme]).await.unwrap();

        let affected = repo
            .update(
                UpdateCriteria::new(id_filter(&id)),
                record(json!({"deletedAt": "2024-01-01T00:00:00Z"})),
            )
            .await
            .unwrap();
        assert_eq!(affected, vec![id]);

        assert!(repo.find(FindOptions::default()).await.unwrap().is_empty());
        assert!(repo.find_one(id_filter(&id), true).await.unwrap().is_some());

        let deleted = repo
            .find(FindOptions::filtered(json!({"deletedAt": {"is": "NOT_NULL"}})))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_skips_unchanged_rows() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (id, acme) = company("Acme");
        repo.insert(vec![acme.clone()]).await.unwrap();

        let mut renamed = acme.clone();
        renamed.set("name", json!("Acme Inc"));
        let (new_id, globex) = company("Globex");

        let ids = repo
            .upsert(vec![acme, renamed, globex], UpsertOptions::default())
            .await
            .unwrap();
        assert_eq!(ids, vec![id, id, new_id]);

        let rows = repo.find(FindOptions::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Acme Inc");
    }

    #[tokio::test]
    async fn test_find_orders_projects_and_loads_relations() {
        let store = InMemoryStore::new();
        let source = store.data_source(Uuid::new_v4());
        let (company_id, acme) = company("Acme");
        source.repository("company").insert(vec![acme]).await.unwrap();

        let people = source.repository("person");
        for name in ["Bob", "Ada"] {
            people
                .insert(vec![record(json!({
                    "id": Uuid::new_v4().to_string(),
                    "name": name,
                    "companyId": company_id.to_string(),
                }))])
                .await
                .unwrap();
        }

        let options = FindOptions {
            order_by: OrderBy::parse(&json!({"name": "AscNullsLast"})).unwrap(),
            select: ["id", "name", "companyId"].map(String::from).into(),
            relations: BTreeMap::from([(
                "company".to_string(),
                RelationDirective {
                    target_object: "company".to_string(),
                    kind: RelationKind::ManyToOne {
                        join_column: "companyId".to_string(),
                    },
                    directives: SelectDirectives {
                        select: ["id", "name"].map(String::from).into(),
                        relations: BTreeMap::new(),
                    },
                },
            )]),
            ..Default::default()
        };
        let rows = people.find(options).await.unwrap();
        assert_eq!(rows[0]["name"], "Ada");
        assert_eq!(rows[1]["company"]["name"], "Acme");

        let companies = source
            .repository("company")
            .find(FindOptions {
                relations: BTreeMap::from([(
                    "people".to_string(),
                    RelationDirective {
                        target_object: "person".to_string(),
                        kind: RelationKind::OneToMany {
                            inverse_join_column: "companyId".to_string(),
                        },
                        directives: SelectDirectives::default(),
                    },
                )]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(companies[0]["people"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at_and_ignores_stamps() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (id, mut acme) = company("Acme");
        acme.set("createdAt", json!("2024-01-01T00:00:00Z"));
        acme.set("updatedAt", json!("2024-01-01T00:00:00Z"));
        repo.insert(vec![acme.clone()]).await.unwrap();

        let mut restamped = acme.clone();
        restamped.set("createdAt", json!("2024-06-01T00:00:00Z"));
        restamped.set("updatedAt", json!("2024-06-01T00:00:00Z"));
        repo.upsert(vec![restamped.clone()], UpsertOptions::default())
            .await
            .unwrap();

        let row = repo.find_one(id_filter(&id), false).await.unwrap().unwrap();
        assert_eq!(row["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(row["updatedAt"], "2024-01-01T00:00:00Z");

        restamped.set("name", json!("Acme Inc"));
        repo.upsert(vec![restamped], UpsertOptions::default())
            .await
            .unwrap();

        let row = repo.find_one(id_filter(&id), false).await.unwrap().unwrap();
        assert_eq!(row["name"], "Acme Inc");
        assert_eq!(row["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(row["updatedAt"], "2024-06-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_update_with_failing_filter_writes_nothing() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (acme_id, acme) = company("Acme");
        let (_, globex) = company("Globex");
        repo.insert(vec![acme, globex]).await.unwrap();

        // Acme short-circuits the `or`; Globex reaches the bad operator
        let filter = json!({"or": [{"name": {"eq": "Acme"}}, {"name": {"bogus": 1}}]});
        let result = repo
            .update(UpdateCriteria::new(filter), record(json!({"name": "Renamed"})))
            .await;
        assert!(result.is_err());

        let row = repo.find_one(id_filter(&acme_id), false).await.unwrap().unwrap();
        assert_eq!(row["name"], "Acme");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let repo = store.data_source(Uuid::new_v4()).repository("company");
        let (id, acme) = company("Acme");
        repo.insert(vec![acme]).await.unwrap();

        assert_eq!(repo.delete(&id).await.unwrap(), 1);
        assert_eq!(repo.delete(&id).await.unwrap(), 0);
    }
}
