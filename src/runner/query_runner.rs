//! Query dispatcher
//!
//! Every call goes through the same pipeline:
//!
//! ```text
//! validate ──▶ pre hooks ──▶ args factory ──▶ resolve ──▶ post hooks
//!                                                             │
//!                               (mutations only) SideEffects ◀┘
//! ```
//!
//! Validation happens before any hook or storage access. Side effects are
//! collected after the resolver committed and never fail the call.

use crate::config::RunnerConfig;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::events::{DatabaseEventAction, EventEmitter};
use crate::core::query::Connection;
use crate::core::queue::{JobOptions, JobQueue};
use crate::core::record::Record;
use crate::runner::args::QueryRunnerArgsFactory;
use crate::runner::event_emitter::SideEffects;
use crate::runner::hooks::HookRegistry;
use crate::runner::instrument::log_execution_time;
use crate::runner::operation::{
    CreateManyArgs, CreateOneArgs, DeleteManyArgs, DeleteOneArgs, DestroyOneArgs,
    FindDuplicatesArgs, FindManyArgs, FindOneArgs, Operation, OperationName, RestoreManyArgs,
    UpdateManyArgs, UpdateOneArgs,
};
use crate::runner::options::QueryRunnerOptions;
use crate::runner::resolvers::{ResolverService, ResolverSet, ResolverSettings};
use crate::runner::result::{OperationResult, ResolverOutput};
use serde_json::Value;
use std::sync::Arc;

pub struct QueryRunner {
    resolvers: ResolverSet,
    hooks: HookRegistry,
    event_emitter: Arc<dyn EventEmitter>,
    job_queue: Arc<dyn JobQueue>,
    config: RunnerConfig,
}

impl QueryRunner {
    pub fn new(
        config: RunnerConfig,
        event_emitter: Arc<dyn EventEmitter>,
        job_queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            resolvers: ResolverSet::new(ResolverSettings::from(&config)),
            hooks: HookRegistry::new(),
            event_emitter,
            job_queue,
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one operation through the full pipeline, without side effects
    pub async fn execute_query(
        &self,
        operation: Operation,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let name = operation.name();
        let object_name = options.object_name();
        tracing::debug!(object = object_name, operation = %name, "executing query");

        match &operation {
            Operation::FindOne(args) => self.resolvers.find_one.validate(args, options)?,
            Operation::FindMany(args) => self.resolvers.find_many.validate(args, options)?,
            Operation::FindDuplicates(args) => {
                self.resolvers.find_duplicates.validate(args, options)?
            }
            Operation::CreateMany(args) => self.resolvers.create_many.validate(args, options)?,
            Operation::UpdateOne(args) => self.resolvers.update_one.validate(args, options)?,
            Operation::UpdateMany(args) => self.resolvers.update_many.validate(args, options)?,
            Operation::DeleteOne(args) => self.resolvers.delete_one.validate(args, options)?,
            Operation::DeleteMany(args) => self.resolvers.delete_many.validate(args, options)?,
            Operation::DestroyOne(args) => self.resolvers.destroy_one.validate(args, options)?,
            Operation::RestoreMany(args) => self.resolvers.restore_many.validate(args, options)?,
        }

        let operation = self
            .hooks
            .execute_pre_query_hooks(&options.auth_context, object_name, operation)
            .await?;

        let operation = QueryRunnerArgsFactory::create(operation, &options.object_metadata)?;

        let mut output = match operation {
            Operation::FindOne(args) => self.resolvers.find_one.resolve(args, options).await?,
            Operation::FindMany(args) => self.resolvers.find_many.resolve(args, options).await?,
            Operation::FindDuplicates(args) => {
                self.resolvers.find_duplicates.resolve(args, options).await?
            }
            Operation::CreateMany(args) => {
                self.resolvers.create_many.resolve(args, options).await?
            }
            Operation::UpdateOne(args) => self.resolvers.update_one.resolve(args, options).await?,
            Operation::UpdateMany(args) => {
                self.resolvers.update_many.resolve(args, options).await?
            }
            Operation::DeleteOne(args) => self.resolvers.delete_one.resolve(args, options).await?,
            Operation::DeleteMany(args) => {
                self.resolvers.delete_many.resolve(args, options).await?
            }
            Operation::DestroyOne(args) => {
                self.resolvers.destroy_one.resolve(args, options).await?
            }
            Operation::RestoreMany(args) => {
                self.resolvers.restore_many.resolve(args, options).await?
            }
        };

        let mut records = output.data.to_records();
        self.hooks
            .execute_post_query_hooks(&options.auth_context, object_name, name, &mut records)
            .await?;
        output.data.replace_records(records);

        Ok(output)
    }

    async fn execute_mutation(
        &self,
        operation: Operation,
        action: DatabaseEventAction,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<OperationResult> {
        let updated_fields = match &operation {
            Operation::UpdateOne(args) => Some(args.data.keys().cloned().collect()),
            Operation::UpdateMany(args) => Some(args.data.keys().cloned().collect()),
            _ => None,
        };
        let name = operation.name();

        let output = self.execute_query(operation, options).await?;
        let records = output.data.to_records();
        tracing::info!(
            object = options.object_name(),
            operation = %name,
            affected = records.len(),
            "mutation committed"
        );

        SideEffects::collect(
            action,
            options,
            &records,
            &output.previous,
            updated_fields,
            JobOptions::with_retry_limit(self.config.webhook_retry_limit),
        )
        .dispatch(self.event_emitter.as_ref(), self.job_queue.as_ref())
        .await;

        Ok(output.data)
    }

    pub async fn find_one(
        &self,
        args: FindOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Record> {
        log_execution_time("findOne", async {
            let output = self.execute_query(Operation::FindOne(args), options).await?;
            expect_record(output.data, options)
        })
        .await
    }

    pub async fn find_many(
        &self,
        args: FindManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Connection> {
        log_execution_time("findMany", async {
            match self.execute_query(Operation::FindMany(args), options).await?.data {
                OperationResult::Connection(connection) => Ok(connection),
                other => Err(unexpected_shape(OperationName::FindMany, &other)),
            }
        })
        .await
    }

    pub async fn find_duplicates(
        &self,
        args: FindDuplicatesArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Vec<Connection>> {
        log_execution_time("findDuplicates", async {
            match self
                .execute_query(Operation::FindDuplicates(args), options)
                .await?
                .data
            {
                OperationResult::Connections(connections) => Ok(connections),
                other => Err(unexpected_shape(OperationName::FindDuplicates, &other)),
            }
        })
        .await
    }

    /// `createMany` with a single record
    pub async fn create_one(
        &self,
        args: CreateOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Record> {
        log_execution_time("createOne", async {
            let operation = Operation::CreateMany(CreateManyArgs {
                data: vec![args.data],
                upsert: args.upsert,
            });
            let data = self
                .execute_mutation(operation, DatabaseEventAction::Created, options)
                .await?;
            expect_record(data, options)
        })
        .await
    }

    pub async fn create_many(
        &self,
        args: CreateManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Vec<Record>> {
        log_execution_time("createMany", async {
            let data = self
                .execute_mutation(
                    Operation::CreateMany(args),
                    DatabaseEventAction::Created,
                    options,
                )
                .await?;
            Ok(data.into_records())
        })
        .await
    }

    pub async fn update_one(
        &self,
        args: UpdateOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Record> {
        log_execution_time("updateOne", async {
            let data = self
                .execute_mutation(
                    Operation::UpdateOne(args),
                    DatabaseEventAction::Updated,
                    options,
                )
                .await?;
            expect_record(data, options)
        })
        .await
    }

    pub async fn update_many(
        &self,
        args: UpdateManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Vec<Record>> {
        log_execution_time("updateMany", async {
            let data = self
                .execute_mutation(
                    Operation::UpdateMany(args),
                    DatabaseEventAction::Updated,
                    options,
                )
                .await?;
            Ok(data.into_records())
        })
        .await
    }

    pub async fn delete_one(
        &self,
        args: DeleteOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Record> {
        log_execution_time("deleteOne", async {
            let data = self
                .execute_mutation(
                    Operation::DeleteOne(args),
                    DatabaseEventAction::Deleted,
                    options,
                )
                .await?;
            expect_record(data, options)
        })
        .await
    }

    pub async fn delete_many(
        &self,
        args: DeleteManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Vec<Record>> {
        log_execution_time("deleteMany", async {
            let data = self
                .execute_mutation(
                    Operation::DeleteMany(args),
                    DatabaseEventAction::Deleted,
                    options,
                )
                .await?;
            Ok(data.into_records())
        })
        .await
    }

    pub async fn destroy_one(
        &self,
        args: DestroyOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Record> {
        log_execution_time("destroyOne", async {
            let data = self
                .execute_mutation(
                    Operation::DestroyOne(args),
                    DatabaseEventAction::Destroyed,
                    options,
                )
                .await?;
            expect_record(data, options)
        })
        .await
    }

    pub async fn restore_many(
        &self,
        args: RestoreManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<Vec<Record>> {
        log_execution_time("restoreMany", async {
            let data = self
                .execute_mutation(
                    Operation::RestoreMany(args),
                    DatabaseEventAction::Restored,
                    options,
                )
                .await?;
            Ok(data.into_records())
        })
        .await
    }

    /// Decode `args` for `operation` and run the matching public method
    ///
    /// `createOne` is accepted as an alias taking a single `data` record.
    pub async fn execute_json(
        &self,
        operation: &str,
        args: Value,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<OperationResult> {
        if operation == "createOne" {
            let args: CreateOneArgs = serde_json::from_value(args)?;
            return Ok(OperationResult::Record(self.create_one(args, options).await?));
        }

        let name: OperationName = operation.parse()?;
        Ok(match Operation::from_json(name, args)? {
            Operation::FindOne(args) => OperationResult::Record(self.find_one(args, options).await?),
            Operation::FindMany(args) => {
                OperationResult::Connection(self.find_many(args, options).await?)
            }
            Operation::FindDuplicates(args) => {
                OperationResult::Connections(self.find_duplicates(args, options).await?)
            }
            Operation::CreateMany(args) => {
                OperationResult::Records(self.create_many(args, options).await?)
            }
            Operation::UpdateOne(args) => {
                OperationResult::Record(self.update_one(args, options).await?)
            }
            Operation::UpdateMany(args) => {
                OperationResult::Records(self.update_many(args, options).await?)
            }
            Operation::DeleteOne(args) => {
                OperationResult::Record(self.delete_one(args, options).await?)
            }
            Operation::DeleteMany(args) => {
                OperationResult::Records(self.delete_many(args, options).await?)
            }
            Operation::DestroyOne(args) => {
                OperationResult::Record(self.destroy_one(args, options).await?)
            }
            Operation::RestoreMany(args) => {
                OperationResult::Records(self.restore_many(args, options).await?)
            }
        })
    }
}

fn expect_record(data: OperationResult, options: &QueryRunnerOptions) -> QueryRunnerResult<Record> {
    data.into_record()
        .ok_or_else(|| QueryRunnerError::RecordNotFound {
            object: options.object_name().to_string(),
            id: None,
        })
}

fn unexpected_shape(name: OperationName, result: &OperationResult) -> QueryRunnerError {
    let shape = match result {
        OperationResult::Record(_) => "record",
        OperationResult::Records(_) => "record list",
        OperationResult::Connection(_) => "connection",
        OperationResult::Connections(_) => "connection list",
    };
    QueryRunnerError::Internal(format!("{} resolved to a {}", name, shape))
}
