//! Operation resolvers
//!
//! One resolver per operation kind. `validate` runs before any hook or storage
//! access; `resolve` is the only step touching persisted state. Every resolver
//! funnels storage rows through [`format_records`] so results have the same
//! shape whichever operation produced them.

mod create_many;
mod destroy_one;
mod find_duplicates;
mod find_many;
mod find_one;
mod restore_many;
mod soft_delete;
mod update_many;
mod update_one;

pub use create_many::CreateManyResolver;
pub use destroy_one::DestroyOneResolver;
pub use find_duplicates::FindDuplicatesResolver;
pub use find_many::FindManyResolver;
pub use find_one::FindOneResolver;
pub use restore_many::RestoreManyResolver;
pub use soft_delete::{DeleteManyResolver, DeleteOneResolver};
pub use update_many::UpdateManyResolver;
pub use update_one::UpdateOneResolver;

use crate::config::RunnerConfig;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::filter::{RecordFilter, ids_filter};
use crate::core::format::format_result;
use crate::core::metadata::ObjectMetadata;
use crate::core::record::Record;
use crate::core::selection::{FieldSelector, SelectDirectives};
use crate::core::service::{FindOptions, RecordRepository};
use crate::runner::mapper::ObjectRecordsToConnectionMapper;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::ResolverOutput;
use async_trait::async_trait;
use uuid::Uuid;

/// Validate and resolve one operation kind
#[async_trait]
pub trait ResolverService: Send + Sync {
    type Args: Send + Sync;

    fn validate(&self, args: &Self::Args, options: &QueryRunnerOptions) -> QueryRunnerResult<()>;

    async fn resolve(
        &self,
        args: Self::Args,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput>;
}

/// Limits shared by the resolvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_relation_depth: usize,
}

impl From<&RunnerConfig> for ResolverSettings {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            max_relation_depth: config.max_relation_depth,
        }
    }
}

/// One instance of every resolver
pub struct ResolverSet {
    pub find_one: FindOneResolver,
    pub find_many: FindManyResolver,
    pub find_duplicates: FindDuplicatesResolver,
    pub create_many: CreateManyResolver,
    pub update_one: UpdateOneResolver,
    pub update_many: UpdateManyResolver,
    pub delete_one: DeleteOneResolver,
    pub delete_many: DeleteManyResolver,
    pub destroy_one: DestroyOneResolver,
    pub restore_many: RestoreManyResolver,
}

impl ResolverSet {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            find_one: FindOneResolver::new(settings),
            find_many: FindManyResolver::new(settings),
            find_duplicates: FindDuplicatesResolver::new(settings),
            create_many: CreateManyResolver::new(settings),
            update_one: UpdateOneResolver::new(settings),
            update_many: UpdateManyResolver::new(settings),
            delete_one: DeleteOneResolver::new(settings),
            delete_many: DeleteManyResolver::new(settings),
            destroy_one: DestroyOneResolver::new(settings),
            restore_many: RestoreManyResolver::new(settings),
        }
    }
}

pub(crate) fn assert_mutation_not_on_remote_object(
    object: &ObjectMetadata,
) -> QueryRunnerResult<()> {
    if object.is_remote {
        return Err(QueryRunnerError::MutationForbidden {
            object: object.name_singular.clone(),
        });
    }
    Ok(())
}

/// Select and relation directives for the caller's selection
pub(crate) fn select_directives(
    options: &QueryRunnerOptions,
    settings: ResolverSettings,
) -> QueryRunnerResult<SelectDirectives> {
    FieldSelector::new(&options.metadata_map, settings.max_relation_depth)
        .parse_selected_fields(&options.object_metadata, &options.selection)
}

pub(crate) fn find_options(
    filter: RecordFilter,
    directives: &SelectDirectives,
    with_deleted: bool,
) -> FindOptions {
    FindOptions {
        filter,
        select: directives.select.clone(),
        relations: directives.relations.clone(),
        with_deleted,
        ..Default::default()
    }
}

/// Storage rows -> client records
pub(crate) fn format_records(
    rows: Vec<Record>,
    options: &QueryRunnerOptions,
    settings: ResolverSettings,
) -> QueryRunnerResult<Vec<Record>> {
    let formatted = format_result(rows, &options.object_metadata, &options.metadata_map);
    ObjectRecordsToConnectionMapper::new(&options.metadata_map, settings.max_relation_depth)
        .process_records(formatted, &options.object_metadata)
}

/// Fetch rows by id, formatted, in the order of `ids`
pub(crate) async fn fetch_by_ids(
    repository: &dyn RecordRepository,
    ids: &[Uuid],
    directives: &SelectDirectives,
    options: &QueryRunnerOptions,
    settings: ResolverSettings,
) -> QueryRunnerResult<Vec<Record>> {
    let mut unique: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    if unique.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = repository
        .find(find_options(ids_filter(&unique), directives, true))
        .await?;
    rows.sort_by_key(|row| {
        row.id()
            .and_then(|id| unique.iter().position(|u| *u == id))
            .unwrap_or(usize::MAX)
    });
    format_records(rows, options, settings)
}

pub(crate) fn parse_id(id: &str) -> QueryRunnerResult<Uuid> {
    crate::core::field::assert_is_valid_uuid(id)
}
