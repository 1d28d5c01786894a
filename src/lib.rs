//! # Workspace Query Runner
//!
//! A metadata-driven CRUD engine for multi-tenant record APIs.
//!
//! ## Features
//!
//! - **Metadata-Driven**: objects and fields are declared per workspace, not compiled in
//! - **Typed Operations**: findOne, findMany, findDuplicates, createMany, updateOne,
//!   updateMany, deleteOne/Many, destroyOne, restoreMany
//! - **Field Selection**: nested relations loaded from a selection tree, cursor connections
//! - **Soft Delete**: deleted records stay restorable until destroyed
//! - **Hooks**: pre/post query hooks per object and operation
//! - **Lifecycle Events**: one event batch per mutation on an in-process bus
//! - **Webhooks**: one job per affected record, fanned out to subscribed targets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use query_runner::prelude::*;
//!
//! let store = InMemoryStore::new();
//! let metadata = Arc::new(MetadataConfig::from_yaml_file("objects.yaml")?.into_map());
//! let runner = QueryRunner::new(
//!     RunnerConfig::default(),
//!     Arc::new(EventBus::default()),
//!     Arc::new(InMemoryQueue::new()),
//! );
//!
//! let options = QueryRunnerOptions::new(
//!     AuthContext::new(workspace_id),
//!     metadata,
//!     "company",
//!     Arc::new(store.data_source(workspace_id)),
//! )?;
//!
//! let company = runner
//!     .create_one(CreateOneArgs { data: record, upsert: false }, &options)
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod runner;
pub mod server;
pub mod storage;
pub mod webhooks;

/// Re-exports of commonly used types and traits
pub mod prelude {
    pub use crate::config::{MetadataConfig, RunnerConfig};

    pub use crate::core::{
        AuthContext, Connection, DataSourceProvider, DatabaseEventAction, DomainEvent, EventBus,
        EventEmitter, FieldMetadata, FieldMetadataType, InMemoryQueue, JobHandler, JobOptions,
        JobQueue, JobRegistry, ObjectMetadata, ObjectMetadataMap, PaginationArgs,
        QueryRunnerError, QueryRunnerResult, Record, RecordRepository, SelectionTree,
        WorkspaceDataSource,
    };

    pub use crate::runner::{
        CreateManyArgs, CreateOneArgs, DeleteManyArgs, DeleteOneArgs, DestroyOneArgs,
        FindDuplicatesArgs, FindManyArgs, FindOneArgs, FnPostQueryHook, FnPreQueryHook,
        HookRegistry, Operation, OperationName, OperationResult, PostQueryHook, PreQueryHook,
        QueryRunner, QueryRunnerOptions, RestoreManyArgs, UpdateManyArgs, UpdateOneArgs,
    };

    pub use crate::server::{ServerBuilder, ServerHost};

    #[cfg(feature = "in-memory")]
    pub use crate::storage::{InMemoryDataSource, InMemoryStore};

    pub use crate::webhooks::{
        LoggingWebhookSender, Webhook, WebhookRegistry, WebhookSender, webhook_job_registry,
    };

    #[cfg(feature = "webhook-http")]
    pub use crate::webhooks::HttpWebhookSender;

    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
