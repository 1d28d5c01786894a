//! Workspace query runner
//!
//! [`QueryRunner`] dispatches typed operations to their resolvers and turns
//! committed mutations into domain events and webhook jobs.

pub mod args;
pub mod event_emitter;
pub mod hooks;
pub mod instrument;
pub mod mapper;
pub mod operation;
pub mod options;
pub mod query_runner;
pub mod resolvers;
pub mod result;
pub mod webhooks;

pub use args::QueryRunnerArgsFactory;
pub use event_emitter::{SideEffects, sanitize_snapshot};
pub use hooks::{FnPostQueryHook, FnPreQueryHook, HookRegistry, PostQueryHook, PreQueryHook};
pub use instrument::log_execution_time;
pub use mapper::ObjectRecordsToConnectionMapper;
pub use operation::{
    CreateManyArgs, CreateOneArgs, DeleteManyArgs, DeleteOneArgs, DestroyOneArgs,
    FindDuplicatesArgs, FindManyArgs, FindOneArgs, Operation, OperationName, RestoreManyArgs,
    UpdateManyArgs, UpdateOneArgs,
};
pub use options::QueryRunnerOptions;
pub use query_runner::QueryRunner;
pub use resolvers::{ResolverService, ResolverSet, ResolverSettings};
pub use result::{OperationResult, ResolverOutput};
pub use webhooks::{
    CALL_WEBHOOK_JOB, CALL_WEBHOOK_JOBS_JOB, CallWebhookJobsJobData, WebhookJobOperation,
};
