//! Server host for transport-agnostic API exposure
//!
//! The host bundles everything a transport needs to answer a request: the
//! query runner, the metadata of every workspace and the data-source
//! provider. Exposures build per-request [`QueryRunnerOptions`] from it.

use crate::core::auth::AuthContext;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::events::EventBus;
use crate::core::metadata::ObjectMetadataMap;
use crate::core::selection::SelectionTree;
use crate::core::service::DataSourceProvider;
use crate::runner::{QueryRunner, QueryRunnerOptions};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Object metadata keyed by workspace
#[derive(Debug, Default)]
pub struct WorkspaceMetadataStore {
    maps: RwLock<HashMap<Uuid, Arc<ObjectMetadataMap>>>,
}

impl WorkspaceMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the metadata of a workspace
    pub fn register(&self, workspace_id: Uuid, metadata: ObjectMetadataMap) -> Result<()> {
        self.maps
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .insert(workspace_id, Arc::new(metadata));
        Ok(())
    }

    pub fn get(&self, workspace_id: Uuid) -> Result<Option<Arc<ObjectMetadataMap>>> {
        Ok(self
            .maps
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?
            .get(&workspace_id)
            .cloned())
    }

    pub fn workspace_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .maps
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?
            .keys()
            .copied()
            .collect())
    }
}

pub struct ServerHost {
    pub runner: Arc<QueryRunner>,

    pub metadata: Arc<WorkspaceMetadataStore>,

    /// Tenant-scoped storage handles
    pub data_sources: Arc<dyn DataSourceProvider>,

    /// Bus the runner emits on, when the host owns one
    pub event_bus: Option<EventBus>,
}

impl ServerHost {
    pub fn new(
        runner: Arc<QueryRunner>,
        metadata: Arc<WorkspaceMetadataStore>,
        data_sources: Arc<dyn DataSourceProvider>,
    ) -> Self {
        Self {
            runner,
            metadata,
            data_sources,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Options for one call on `object_name` in the caller's workspace
    ///
    /// A workspace without registered metadata knows no objects, so the call
    /// fails with `MetadataNotFound`.
    pub fn options(
        &self,
        auth_context: AuthContext,
        object_name: &str,
        selection: SelectionTree,
    ) -> QueryRunnerResult<QueryRunnerOptions> {
        let metadata = self
            .metadata
            .get(auth_context.workspace_id)?
            .ok_or_else(|| QueryRunnerError::MetadataNotFound {
                object: object_name.to_string(),
            })?;
        let data_source = self.data_sources.data_source(auth_context.workspace_id);

        Ok(QueryRunnerOptions::new(auth_context, metadata, object_name, data_source)?
            .with_selection(selection))
    }
}
