//! Shapes formatted records for clients: type names and nested connections

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::metadata::{ObjectMetadata, ObjectMetadataMap, RelationKind};
use crate::core::query::single_page;
use crate::core::record::{Record, TYPENAME_FIELD};
use serde_json::Value;

pub struct ObjectRecordsToConnectionMapper<'a> {
    metadata_map: &'a ObjectMetadataMap,
    max_depth: usize,
}

impl<'a> ObjectRecordsToConnectionMapper<'a> {
    pub fn new(metadata_map: &'a ObjectMetadataMap, max_depth: usize) -> Self {
        Self {
            metadata_map,
            max_depth,
        }
    }

    /// Add `__typename` and turn loaded one-to-many arrays into connections
    ///
    /// Relations nested deeper than `max_depth` are dropped.
    pub fn process_record(
        &self,
        record: Record,
        object: &ObjectMetadata,
        depth: usize,
    ) -> QueryRunnerResult<Record> {
        let mut processed = Record::new();
        processed.set(TYPENAME_FIELD, Value::String(object.type_name()));

        for (key, value) in record.into_map() {
            let relation = object.field(&key).and_then(|f| f.relation.as_ref());
            let Some(relation) = relation else {
                processed.set(key, value);
                continue;
            };
            if depth >= self.max_depth {
                continue;
            }
            let target = self.metadata_map.get_or_throw(&relation.target_object)?;

            let value = match (&relation.kind, value) {
                (RelationKind::ManyToOne { .. }, Value::Object(map)) => self
                    .process_record(Record::from(map), &target, depth + 1)?
                    .into_value(),
                (RelationKind::OneToMany { .. }, Value::Array(items)) => {
                    let nodes = items
                        .into_iter()
                        .filter_map(Record::from_value)
                        .map(|node| self.process_record(node, &target, depth + 1))
                        .collect::<QueryRunnerResult<Vec<_>>>()?;
                    serde_json::to_value(single_page(nodes))
                        .map_err(|e| QueryRunnerError::Internal(e.to_string()))?
                }
                (_, other) => other,
            };
            processed.set(key, value);
        }

        Ok(processed)
    }

    pub fn process_records(
        &self,
        records: Vec<Record>,
        object: &ObjectMetadata,
    ) -> QueryRunnerResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.process_record(record, object, 0))
            .collect()
    }
}
