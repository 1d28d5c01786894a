use super::{
    ResolverService, ResolverSettings, assert_mutation_not_on_remote_object, fetch_by_ids,
    find_options, format_records, select_directives,
};
use crate::core::error::QueryRunnerResult;
use crate::core::format::{format_data, format_filter};
use crate::core::service::UpdateCriteria;
use crate::runner::operation::UpdateManyArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;

/// Filtered update of non-deleted rows, returning every affected row
pub struct UpdateManyResolver {
    settings: ResolverSettings,
}

impl UpdateManyResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for UpdateManyResolver {
    type Args = UpdateManyArgs;

    fn validate(&self, _args: &UpdateManyArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        assert_mutation_not_on_remote_object(&options.object_metadata)
    }

    async fn resolve(
        &self,
        args: UpdateManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;
        let filter = format_filter(&args.filter, &options.object_metadata)?;
        let data = format_data(&args.data, &options.object_metadata)?;

        let previous_rows = repository
            .find(find_options(filter.clone(), &directives, false))
            .await?;
        let previous = format_records(previous_rows, options, self.settings)?;

        let affected = repository.update(UpdateCriteria::new(filter), data).await?;
        let records =
            fetch_by_ids(repository.as_ref(), &affected, &directives, options, self.settings)
                .await?;

        Ok(ResolverOutput::new(OperationResult::Records(records)).with_previous(previous))
    }
}
