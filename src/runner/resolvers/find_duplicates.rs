use super::{
    ResolverService, ResolverSettings, find_options, format_records, parse_id, select_directives,
};
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::filter::{RecordFilter, and_filters, ids_filter};
use crate::core::format::format_data;
use crate::core::metadata::ObjectMetadata;
use crate::core::query::{Connection, single_page};
use crate::core::record::{ID_FIELD, Record};
use crate::core::service::FindOptions;
use crate::runner::operation::FindDuplicatesArgs;
use crate::runner::options::QueryRunnerOptions;
use crate::runner::result::{OperationResult, ResolverOutput};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Finds records that look like the given ones
///
/// Each group of the object's duplicate criteria is a list of columns; two
/// records are duplicates when every column of one group is equal and
/// non-empty. The result holds one connection per input record.
pub struct FindDuplicatesResolver {
    settings: ResolverSettings,
}

impl FindDuplicatesResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Filter matching duplicates of `row`, `None` when no criteria group applies
fn duplicate_filter(row: &Record, object: &ObjectMetadata) -> Option<RecordFilter> {
    let groups: Vec<Value> = object
        .duplicate_criteria
        .iter()
        .filter_map(|columns| {
            let conditions = columns
                .iter()
                .map(|column| {
                    row.get(column)
                        .filter(|value| !is_blank(value))
                        .map(|value| json!({ column.as_str(): { "eq": value } }))
                })
                .collect::<Option<Vec<Value>>>()?;
            (!conditions.is_empty()).then(|| and_filters(conditions))
        })
        .collect();

    if groups.is_empty() {
        return None;
    }

    let candidates = json!({ "or": groups });
    Some(match row.get(ID_FIELD).filter(|id| !is_blank(id)) {
        Some(id) => and_filters(vec![candidates, json!({ ID_FIELD: { "neq": id } })]),
        None => candidates,
    })
}

#[async_trait]
impl ResolverService for FindDuplicatesResolver {
    type Args = FindDuplicatesArgs;

    fn validate(
        &self,
        args: &FindDuplicatesArgs,
        _options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<()> {
        match (&args.ids, &args.data) {
            (Some(_), Some(_)) | (None, None) => Err(QueryRunnerError::invalid_input(
                "You have to provide either 'data' or 'ids' argument",
            )),
            (Some(ids), None) => ids.iter().try_for_each(|id| parse_id(id).map(|_| ())),
            (None, Some(_)) => Ok(()),
        }
    }

    async fn resolve(
        &self,
        args: FindDuplicatesArgs,
        options: &QueryRunnerOptions,
    ) -> QueryRunnerResult<ResolverOutput> {
        let object = &options.object_metadata;
        let repository = options.repository();
        let directives = select_directives(options, self.settings)?;

        let probes: Vec<Record> = match (args.ids, args.data) {
            (Some(ids), _) => {
                let ids = ids
                    .iter()
                    .map(|id| parse_id(id))
                    .collect::<QueryRunnerResult<Vec<_>>>()?;
                let mut rows = repository.find(FindOptions::filtered(ids_filter(&ids))).await?;
                rows.sort_by_key(|row| {
                    row.id()
                        .and_then(|id| ids.iter().position(|i| *i == id))
                        .unwrap_or(usize::MAX)
                });
                rows
            }
            (None, Some(data)) => data
                .iter()
                .map(|record| format_data(record, object))
                .collect::<QueryRunnerResult<Vec<_>>>()?,
            (None, None) => Vec::new(),
        };

        let mut connections: Vec<Connection> = Vec::with_capacity(probes.len());
        for probe in &probes {
            let records = match duplicate_filter(probe, object) {
                Some(filter) => {
                    let rows = repository
                        .find(find_options(filter, &directives, false))
                        .await?;
                    format_records(rows, options, self.settings)?
                }
                None => Vec::new(),
            };
            connections.push(single_page(records));
        }

        Ok(ResolverOutput::new(OperationResult::Connections(connections)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{FieldMetadata, FieldMetadataType};

    fn person() -> ObjectMetadata {
        ObjectMetadata::new(
            "person",
            vec![
                FieldMetadata::new("name", FieldMetadataType::FullName),
                FieldMetadata::new("emails", FieldMetadataType::Emails),
            ],
        )
        .with_duplicate_criteria(vec![
            vec!["nameFirstName", "nameLastName"],
            vec!["emailsPrimaryEmail"],
        ])
    }

    #[test]
    fn test_duplicate_filter_skips_blank_groups() {
        let row = Record::from_value(json!({
            "id": "p1",
            "nameFirstName": "Ada",
            "nameLastName": "",
            "emailsPrimaryEmail": "ada@acme.com",
        }))
        .unwrap();

        let filter = duplicate_filter(&row, &person()).unwrap();
        assert_eq!(
            filter,
            json!({"and": [
                {"or": [{"emailsPrimaryEmail": {"eq": "ada@acme.com"}}]},
                {"id": {"neq": "p1"}},
            ]})
        );
    }

    #[test]
    fn test_no_applicable_criteria() {
        let row = Record::from_value(json!({"nameFirstName": "Ada"})).unwrap();
        assert!(duplicate_filter(&row, &person()).is_none());
    }
}
