use crate::core::auth::AuthContext;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::metadata::{ObjectMetadata, ObjectMetadataMap};
use crate::core::selection::SelectionTree;
use crate::core::service::{RecordRepository, WorkspaceDataSource};
use std::sync::Arc;

/// Per-call context of the query runner
///
/// Carries the caller, the target object, the workspace metadata and the
/// tenant-scoped storage handle. Nothing is looked up globally.
#[derive(Clone)]
pub struct QueryRunnerOptions {
    pub auth_context: AuthContext,
    pub object_metadata: Arc<ObjectMetadata>,
    pub metadata_map: Arc<ObjectMetadataMap>,
    pub data_source: Arc<dyn WorkspaceDataSource>,
    /// Fields requested by the caller; empty selects every column
    pub selection: SelectionTree,
}

impl QueryRunnerOptions {
    /// Build options for `object_name`, failing with `MetadataNotFound` if the
    /// workspace does not define it
    pub fn new(
        auth_context: AuthContext,
        metadata_map: Arc<ObjectMetadataMap>,
        object_name: &str,
        data_source: Arc<dyn WorkspaceDataSource>,
    ) -> QueryRunnerResult<Self> {
        if data_source.workspace_id() != auth_context.workspace_id {
            return Err(QueryRunnerError::Internal(format!(
                "Data source of workspace {} used for workspace {}",
                data_source.workspace_id(),
                auth_context.workspace_id
            )));
        }
        let object_metadata = metadata_map.get_or_throw(object_name)?;

        Ok(Self {
            auth_context,
            object_metadata,
            metadata_map,
            data_source,
            selection: SelectionTree::default(),
        })
    }

    pub fn with_selection(mut self, selection: SelectionTree) -> Self {
        self.selection = selection;
        self
    }

    pub fn object_name(&self) -> &str {
        &self.object_metadata.name_singular
    }

    /// Repository of the target object in the caller's workspace
    pub fn repository(&self) -> Arc<dyn RecordRepository> {
        self.data_source.repository(self.object_name())
    }
}
