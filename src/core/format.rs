//! Conversions between API-shaped records and flattened storage rows
//!
//! Composite fields (emails, full names, links, currencies) are nested objects
//! in the API and one column per sub-field in storage:
//!
//! ```text
//! { "emails": { "primaryEmail": "a@acme.com", "additionalEmails": [] } }
//!     <=> { "emailsPrimaryEmail": "a@acme.com", "emailsAdditionalEmails": [] }
//! ```

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::field::validate_emails_value;
use crate::core::filter::{OrderBy, RecordFilter};
use crate::core::metadata::{
    FieldMetadata, FieldMetadataType, ObjectMetadata, ObjectMetadataMap, composite_column,
};
use crate::core::record::{Record, SYSTEM_COLUMNS};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn writable_field<'a>(
    object: &'a ObjectMetadata,
    name: &str,
) -> QueryRunnerResult<Option<&'a FieldMetadata>> {
    match object.field(name) {
        Some(field) if field.is_relation() => Err(QueryRunnerError::invalid_input(format!(
            "Relation field '{}' cannot be used here on object '{}'",
            name, object.name_singular
        ))),
        Some(field) => Ok(Some(field)),
        None if SYSTEM_COLUMNS.contains(&name) => Ok(None),
        None => Err(QueryRunnerError::invalid_input(format!(
            "Field '{}' not found in object '{}'",
            name, object.name_singular
        ))),
    }
}

/// Flatten API input data into storage columns
pub fn format_data(data: &Record, object: &ObjectMetadata) -> QueryRunnerResult<Record> {
    let mut row = Record::new();

    for (key, value) in data.iter() {
        let Some(field) = writable_field(object, key)? else {
            row.set(key.clone(), value.clone());
            continue;
        };

        let Some(properties) = field.field_type.composite_properties() else {
            row.set(key.clone(), value.clone());
            continue;
        };

        if field.field_type == FieldMetadataType::Emails {
            validate_emails_value(key, value)?;
        }

        match value {
            Value::Null => {
                for property in properties {
                    row.set(composite_column(key, property), Value::Null);
                }
            }
            Value::Object(parts) => {
                for (property, part) in parts {
                    if !properties.contains(&property.as_str()) {
                        return Err(QueryRunnerError::invalid_input(format!(
                            "Unknown property '{}' for composite field '{}'",
                            property, key
                        )));
                    }
                    row.set(composite_column(key, property), part.clone());
                }
            }
            other => {
                return Err(QueryRunnerError::invalid_input(format!(
                    "Composite field '{}' expects an object, got {}",
                    key, other
                )));
            }
        }
    }

    Ok(row)
}

/// Flatten composite field references inside a filter
pub fn format_filter(filter: &RecordFilter, object: &ObjectMetadata) -> QueryRunnerResult<Value> {
    let conditions = match filter {
        Value::Null => return Ok(Value::Object(Map::new())),
        Value::Object(map) => map,
        other => {
            return Err(QueryRunnerError::invalid_input(format!(
                "Filter must be an object, got {}",
                other
            )));
        }
    };

    let mut out = Map::new();
    for (key, condition) in conditions {
        match key.as_str() {
            "and" | "or" => {
                let items = condition.as_array().ok_or_else(|| {
                    QueryRunnerError::invalid_input(format!("'{}' filter expects an array", key))
                })?;
                let formatted = items
                    .iter()
                    .map(|item| format_filter(item, object))
                    .collect::<QueryRunnerResult<Vec<_>>>()?;
                out.insert(key.clone(), Value::Array(formatted));
            }
            "not" => {
                out.insert(key.clone(), format_filter(condition, object)?);
            }
            name => {
                let composite = writable_field(object, name)?
                    .and_then(|field| field.field_type.composite_properties());
                match (composite, condition) {
                    (Some(properties), Value::Object(parts))
                        if parts.keys().all(|k| properties.contains(&k.as_str())) =>
                    {
                        for (property, sub_condition) in parts {
                            out.insert(composite_column(name, property), sub_condition.clone());
                        }
                    }
                    (Some(_), _) => {
                        return Err(QueryRunnerError::invalid_input(format!(
                            "Composite field '{}' must be filtered by sub-field",
                            name
                        )));
                    }
                    (None, _) => {
                        out.insert(key.clone(), condition.clone());
                    }
                }
            }
        }
    }
    Ok(Value::Object(out))
}

/// Flatten and parse an `orderBy` argument
pub fn format_order_by(order_by: &Value, object: &ObjectMetadata) -> QueryRunnerResult<OrderBy> {
    let entries: Vec<&Value> = match order_by {
        Value::Null => return Ok(OrderBy::default()),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut flattened = Vec::new();
    for entry in entries {
        let map = entry
            .as_object()
            .ok_or_else(|| QueryRunnerError::invalid_input("orderBy entries must be objects"))?;
        for (name, direction) in map {
            let composite = writable_field(object, name)?
                .and_then(|field| field.field_type.composite_properties());
            match (composite, direction) {
                (Some(_), Value::Object(parts)) => {
                    for (property, sub_direction) in parts {
                        let mut item = Map::new();
                        item.insert(composite_column(name, property), sub_direction.clone());
                        flattened.push(Value::Object(item));
                    }
                }
                _ => {
                    let mut item = Map::new();
                    item.insert(name.clone(), direction.clone());
                    flattened.push(Value::Object(item));
                }
            }
        }
    }
    OrderBy::parse(&Value::Array(flattened))
}

/// Re-nest storage rows into API-shaped records, following loaded relations
pub fn format_result(
    rows: Vec<Record>,
    object: &ObjectMetadata,
    metadata_map: &ObjectMetadataMap,
) -> Vec<Record> {
    let composite_columns: HashMap<String, (&str, &str)> = object
        .fields
        .iter()
        .filter_map(|field| {
            field
                .field_type
                .composite_properties()
                .map(|properties| (field, properties))
        })
        .flat_map(|(field, properties)| {
            properties.iter().map(move |property| {
                (
                    composite_column(&field.name, property),
                    (field.name.as_str(), *property),
                )
            })
        })
        .collect();

    rows.into_iter()
        .map(|row| {
            let mut record = Record::new();
            for (key, value) in row.into_map() {
                if let Some((field, property)) = composite_columns.get(&key) {
                    let entry = record
                        .entry(field.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(parts) = entry {
                        parts.insert(property.to_string(), value);
                    }
                    continue;
                }

                let target = object
                    .field(&key)
                    .and_then(|f| f.relation.as_ref())
                    .and_then(|relation| metadata_map.get(&relation.target_object));
                let value = match (target, value) {
                    (Some(target), Value::Object(map)) => {
                        format_result(vec![Record::from(map)], target, metadata_map)
                            .pop()
                            .map(Record::into_value)
                            .unwrap_or(Value::Null)
                    }
                    (Some(target), Value::Array(items)) => {
                        let nested: Vec<Record> =
                            items.into_iter().filter_map(Record::from_value).collect();
                        Value::Array(
                            format_result(nested, target, metadata_map)
                                .into_iter()
                                .map(Record::into_value)
                                .collect(),
                        )
                    }
                    (_, value) => value,
                };
                record.set(key, value);
            }
            record
        })
        .collect()
}
