use super::{
    ResolverService, ResolverSettings, assert_mutation_not_on_remote_object, fetch_by_ids,
    find_options, format_records, select_directives,
};
use crate::core::error::QueryRunnerResult;
use crate::core::filter::and_filters;
use crate::core::format::format_filter;
use crate::core::record::{DELETED_AT_FIELD, Record};
use crate::core::service::UpdateCriteria;
use crate::runner::operation::RestoreManyArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Clears `deletedAt` on the soft-deleted rows matching the filter
pub struct RestoreManyResolver {
    settings: ResolverSettings,
}

impl RestoreManyResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for RestoreManyResolver {
    type Args = RestoreManyArgs;

    fn validate(&self, _args: &RestoreManyArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        assert_mutation_not_on_remote_object(&options.object_metadata)
    }

    async fn resolve(
        &self,
        args: RestoreManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;
        let filter = and_filters(vec![
            format_filter(&args.filter, &options.object_metadata)?,
            json!({ DELETED_AT_FIELD: { "is": "NOT_NULL" } }),
        ]);

        let previous_rows = repository
            .find(find_options(filter.clone(), &directives, true))
            .await?;
        let previous = format_records(previous_rows, options, self.settings)?;

        let mut data = Record::new();
        data.set(DELETED_AT_FIELD, Value::Null);
        let affected = repository
            .update(UpdateCriteria::new(filter).with_deleted(), data)
            .await?;

        let records =
            fetch_by_ids(repository.as_ref(), &affected, &directives, options, self.settings)
                .await?;

        Ok(ResolverOutput::new(OperationResult::Records(records)).with_previous(previous))
    }
}
