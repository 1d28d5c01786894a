//! Soft delete: `deletedAt` is written through the update path

use super::{ResolverService, ResolverSettings, UpdateManyResolver, UpdateOneResolver};
use crate::core::error::QueryRunnerResult;
use crate::core::record::{DELETED_AT_FIELD, Record};
use crate::runner::operation::{DeleteManyArgs, DeleteOneArgs, UpdateManyArgs, UpdateOneArgs};
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::ResolverOutput;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

fn deleted_now() -> Record {
    let mut data = Record::new();
    data.set(DELETED_AT_FIELD, Value::String(Utc::now().to_rfc3339()));
    data
}

pub struct DeleteOneResolver {
    update: UpdateOneResolver,
}

impl DeleteOneResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            update: UpdateOneResolver::new(settings),
        }
    }

    fn as_update(args: DeleteOneArgs) -> UpdateOneArgs {
        UpdateOneArgs {
            id: args.id,
            data: deleted_now(),
        }
    }
}

#[async_trait]
impl ResolverService for DeleteOneResolver {
    type Args = DeleteOneArgs;

    fn validate(&self, args: &DeleteOneArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        self.update
            .validate(&Self::as_update(args.clone()), options)
    }

    async fn resolve(
        &self,
        args: DeleteOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        self.update.resolve(Self::as_update(args), options).await
    }
}

pub struct DeleteManyResolver {
    update: UpdateManyResolver,
}

impl DeleteManyResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            update: UpdateManyResolver::new(settings),
        }
    }

    fn as_update(args: DeleteManyArgs) -> UpdateManyArgs {
        UpdateManyArgs {
            filter: args.filter,
            data: deleted_now(),
        }
    }
}

#[async_trait]
impl ResolverService for DeleteManyResolver {
    type Args = DeleteManyArgs;

    fn validate(&self, args: &DeleteManyArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        self.update
            .validate(&Self::as_update(args.clone()), options)
    }

    async fn resolve(
        &self,
        args: DeleteManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        self.update.resolve(Self::as_update(args), options).await
    }
}
