//! Storage collaborator traits
//!
//! The runner is agnostic to the storage engine. It talks to a tenant-scoped
//! [`WorkspaceDataSource`] that hands out one [`RecordRepository`] per object.

use crate::core::filter::{OrderBy, RecordFilter};
use crate::core::record::Record;
use crate::core::selection::RelationDirective;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Options for [`RecordRepository::find`]
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub filter: RecordFilter,
    pub order_by: OrderBy,
    /// Columns to project; empty means every column
    pub select: BTreeSet<String>,
    /// Relations to load, keyed by relation field name
    pub relations: BTreeMap<String, RelationDirective>,
    /// Include soft-deleted rows
    pub with_deleted: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            filter: json!({}),
            order_by: OrderBy::default(),
            select: BTreeSet::new(),
            relations: BTreeMap::new(),
            with_deleted: false,
        }
    }
}

impl FindOptions {
    pub fn filtered(filter: RecordFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// Options for [`RecordRepository::upsert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    pub conflict_paths: Vec<String>,
    pub skip_update_if_no_values_changed: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            conflict_paths: vec!["id".to_string()],
            skip_update_if_no_values_changed: true,
        }
    }
}

/// Target of a filtered update
#[derive(Debug, Clone)]
pub struct UpdateCriteria {
    pub filter: RecordFilter,
    pub with_deleted: bool,
}

impl UpdateCriteria {
    pub fn new(filter: RecordFilter) -> Self {
        Self {
            filter,
            with_deleted: false,
        }
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }
}

/// Row-level storage operations on one object of one workspace
///
/// Records passed in and out are flattened storage rows.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Insert new rows; fails if an id already exists
    async fn insert(&self, records: Vec<Record>) -> Result<Vec<Uuid>>;

    /// Insert or update on conflict, returns the ids of every input row
    async fn upsert(&self, records: Vec<Record>, options: UpsertOptions) -> Result<Vec<Uuid>>;

    /// Filtered, ordered and projected read
    async fn find(&self, options: FindOptions) -> Result<Vec<Record>>;

    /// First row matching `filter`
    async fn find_one(&self, filter: RecordFilter, with_deleted: bool) -> Result<Option<Record>>;

    /// Apply `data` to every matching row, returns the affected ids
    async fn update(&self, criteria: UpdateCriteria, data: Record) -> Result<Vec<Uuid>>;

    /// Physically remove a row, returns the number of rows removed
    async fn delete(&self, id: &Uuid) -> Result<usize>;
}

/// Tenant-scoped storage handle
pub trait WorkspaceDataSource: Send + Sync {
    fn workspace_id(&self) -> Uuid;

    /// Repository for an object, by singular name
    fn repository(&self, object_name: &str) -> Arc<dyn RecordRepository>;
}

/// Hands out data sources per workspace, used by the HTTP layer
pub trait DataSourceProvider: Send + Sync {
    fn data_source(&self, workspace_id: Uuid) -> Arc<dyn WorkspaceDataSource>;
}
