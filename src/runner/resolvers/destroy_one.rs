use super::{
    ResolverService, ResolverSettings, assert_mutation_not_on_remote_object, fetch_by_ids,
    parse_id, select_directives,
};
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::runner::operation::DestroyOneArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;

/// Physical delete, returning the row as it was before removal
///
/// Soft-deleted rows can be destroyed too.
pub struct DestroyOneResolver {
    settings: ResolverSettings,
}

impl DestroyOneResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for DestroyOneResolver {
    type Args = DestroyOneArgs;

    fn validate(&self, args: &DestroyOneArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        assert_mutation_not_on_remote_object(&options.object_metadata)?;
        if args.id.trim().is_empty() {
            return Err(QueryRunnerError::invalid_input("Missing id"));
        }
        parse_id(&args.id)?;
        Ok(())
    }

    async fn resolve(
        &self,
        args: DestroyOneArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let id = parse_id(&args.id)?;
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;
        let not_found = || QueryRunnerError::RecordNotFound {
            object: options.object_name().to_string(),
            id: Some(id),
        };

        let snapshot =
            fetch_by_ids(repository.as_ref(), &[id], &directives, options, self.settings)
                .await?
                .into_iter()
                .next()
                .ok_or_else(not_found)?;

        if repository.delete(&id).await? == 0 {
            return Err(not_found());
        }

        Ok(ResolverOutput::new(OperationResult::Record(snapshot.clone()))
            .with_previous(vec![snapshot]))
    }
}
