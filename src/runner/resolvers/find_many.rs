use super::{ResolverService, ResolverSettings, format_records, select_directives};
use crate::core::error::QueryRunnerResult;
use crate::core::format::{format_filter, format_order_by};
use crate::core::query::paginate;
use crate::core::service::FindOptions;
use crate::runner::operation::FindManyArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;

/// Filtered, ordered, cursor-paginated read
pub struct FindManyResolver {
    settings: ResolverSettings,
}

impl FindManyResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for FindManyResolver {
    type Args = FindManyArgs;

    fn validate(&self, args: &FindManyArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        args.pagination.validate()?;
        format_order_by(&args.order_by, &options.object_metadata)?;
        Ok(())
    }

    async fn resolve(
        &self,
        args: FindManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let directives = select_directives(options, self.settings)?;
        let filter = format_filter(&args.filter, &options.object_metadata)?;
        let order_by = format_order_by(&args.order_by, &options.object_metadata)?.with_id_tiebreak();

        let rows = options
            .repository()
            .find(FindOptions {
                filter,
                order_by,
                select: directives.select,
                relations: directives.relations,
                with_deleted: false,
            })
            .await?;

        let records = format_records(rows, options, self.settings)?;
        let limit = args
            .pagination
            .limit(self.settings.default_page_size, self.settings.max_page_size);

        Ok(ResolverOutput::new(OperationResult::Connection(paginate(
            records,
            &args.pagination,
            limit,
        ))))
    }
}
