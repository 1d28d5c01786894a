use super::{
    ResolverService, ResolverSettings, assert_mutation_not_on_remote_object, fetch_by_ids,
    parse_id, select_directives,
};
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::format::format_data;
use crate::core::record::ID_FIELD;
use crate::core::service::UpsertOptions;
use crate::runner::operation::CreateManyArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;
use serde_json::Value;

/// Inserts (or upserts on `id`) and re-reads the rows in input order
pub struct CreateManyResolver {
    settings: ResolverSettings,
}

impl CreateManyResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ResolverService for CreateManyResolver {
    type Args = CreateManyArgs;

    fn validate(&self, args: &CreateManyArgs, options: &QueryRunnerOptions) -> QueryRunnerResult<()> {
        assert_mutation_not_on_remote_object(&options.object_metadata)?;

        for record in &args.data {
            match record.get(ID_FIELD) {
                None | Some(Value::Null) => {}
                Some(Value::String(id)) => {
                    parse_id(id)?;
                }
                Some(other) => {
                    return Err(QueryRunnerError::invalid_input(format!(
                        "Value '{}' is not a valid UUID",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    async fn resolve(
        &self,
        args: CreateManyArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;

        let rows = args
            .data
            .iter()
            .map(|record| format_data(record, &options.object_metadata))
            .collect::<QueryRunnerResult<Vec<_>>>()?;

        let ids = if args.upsert {
            repository.upsert(rows, UpsertOptions::default()).await?
        } else {
            repository.insert(rows).await?
        };

        let records =
            fetch_by_ids(repository.as_ref(), &ids, &directives, options, self.settings).await?;

        Ok(ResolverOutput::new(OperationResult::Records(records)))
    }
}
