use super::{ResolverService, ResolverSettings, find_options, format_records, select_directives};
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::filter::is_empty_filter;
use crate::core::format::format_filter;
use crate::runner::operation::FindOneArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;

pub struct FindOneResolver {
    settings: ResolverSettings,
}

impl FindOneResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for FindOneResolver {
    type Args = FindOneArgs;

    fn validate(&self, args: &FindOneArgs, _options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        if is_empty_filter(&args.filter) {
            return Err(QueryRunnerError::invalid_input("Missing filter argument"));
        }
        Ok(())
    }

    async fn resolve(
        &self,
        args: FindOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let directives = select_directives(options, self.settings)?;
        let filter = format_filter(&args.filter, &options.object_metadata)?;

        let rows = options
            .repository()
            .find(find_options(filter, &directives, false))
            .await?;

        let record = format_records(rows, options, self.settings)?
            .into_iter()
            .next()
            .ok_or_else(|| QueryRunnerError::RecordNotFound {
                object: options.object_name().to_string(),
                id: None,
            })?;

        Ok(ResolverOutput::new(OperationResult::Record(record)))
    }
}
