use super::{
    ResolverService, ResolverSettings, assert_mutation_not_on_remote_object, fetch_by_ids,
    parse_id, select_directives,
};
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::filter::id_filter;
use crate::core::format::format_data;
use crate::core::service::UpdateCriteria;
use crate::runner::operation::UpdateOneArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;

/// Reads the current row, writes the diff, re-reads the row
///
/// The read and the write are two separate storage calls; a concurrent
/// writer may land in between.
pub struct UpdateOneResolver {
    settings: ResolverSettings,
}

impl UpdateOneResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for UpdateOneResolver {
    type Args = UpdateOneArgs;

    fn validate(&self, args: &UpdateOneArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        assert_mutation_not_on_remote_object(&options.object_metadata)?;
        parse_id(&args.id)?;
        Ok(())
    }

    async fn resolve(
        &self,
        args: UpdateOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let id = parse_id(&args.id)?;
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;
        let data = format_data(&args.data, &options.object_metadata)?;

        let previous =
            fetch_by_ids(repository.as_ref(), &[id], &directives, options, self.settings).await?;

        let affected = repository
            .update(UpdateCriteria::new(id_filter(&id)).with_deleted(), data)
            .await?;
        if affected.is_empty() {
            return Err(QueryRunnerError::RecordNotFound {
                object: options.object_name().to_string(),
                id: Some(id),
            });
        }

        let record = fetch_by_ids(repository.as_ref(), &affected, &directives, options, self.settings)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QueryRunnerError::RecordNotFound {
                object: options.object_name().to_string(),
                id: Some(id),
            })?;

        Ok(ResolverOutput::new(OperationResult::Record(record)).with_previous(previous))
    }
}
