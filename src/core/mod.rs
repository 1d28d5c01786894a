//! Core types and collaborator traits of the query runner

pub mod auth;
pub mod error;
pub mod events;
pub mod field;
pub mod filter;
pub mod format;
pub mod metadata;
pub mod query;
pub mod queue;
pub mod record;
pub mod selection;
pub mod service;

pub use auth::AuthContext;
pub use error::{ConfigError, QueryRunnerError, QueryRunnerResult, QueueError};
pub use events::{DatabaseEventAction, DomainEvent, EventBus, EventEmitter, EventProperties};
pub use field::{EmailsValue, is_valid_email};
pub use filter::{OrderBy, OrderByDirection, RecordFilter};
pub use metadata::{
    FieldMetadata, FieldMetadataType, ObjectMetadata, ObjectMetadataMap, RelationKind,
    RelationMetadata,
};
pub use query::{Connection, Edge, PageInfo, PaginationArgs};
pub use queue::{InMemoryQueue, JobHandler, JobOptions, JobQueue, JobRegistry, QueuedJob};
pub use record::Record;
pub use selection::{FieldSelector, SelectDirectives, SelectionTree};
pub use service::{
    DataSourceProvider, FindOptions, RecordRepository, UpdateCriteria, UpsertOptions,
    WorkspaceDataSource,
};
