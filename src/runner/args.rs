//! Argument factory: turns hook-adjusted arguments into storage arguments

use crate::core::error::QueryRunnerResult;
use crate::core::metadata::ObjectMetadata;
use crate::core::record::{CREATED_AT_FIELD, Record, UPDATED_AT_FIELD};
use crate::runner::operation::Operation;
use chrono::Utc;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Fills defaults and coerces values according to field metadata
///
/// - created records get a v4 `id` when none is given
/// - `createdAt`/`updatedAt` are stamped when the object declares them
/// - numeric strings become numbers for `NUMBER`, `NUMERIC` and `POSITION`
///   fields, in data and in filter comparison values
pub struct QueryRunnerArgsFactory;

impl QueryRunnerArgsFactory {
    pub fn create(operation: Operation, object: &ObjectMetadata) -> QueryRunnerResult<Operation> {
        let now = Value::String(Utc::now().to_rfc3339());

        Ok(match operation {
            Operation::CreateMany(mut args) => {
                for record in &mut args.data {
                    if !record.contains_key("id") {
                        record.set_id(Uuid::new_v4());
                    }
                    for column in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
                        if object.has_field(column) && !record.contains_key(column) {
                            record.set(column, now.clone());
                        }
                    }
                    coerce_data(record, object);
                }
                Operation::CreateMany(args)
            }
            Operation::UpdateOne(mut args) => {
                stamp_update(&mut args.data, object, &now);
                Operation::UpdateOne(args)
            }
            Operation::UpdateMany(mut args) => {
                stamp_update(&mut args.data, object, &now);
                coerce_filter(&mut args.filter, object);
                Operation::UpdateMany(args)
            }
            Operation::FindOne(mut args) => {
                coerce_filter(&mut args.filter, object);
                Operation::FindOne(args)
            }
            Operation::FindMany(mut args) => {
                coerce_filter(&mut args.filter, object);
                Operation::FindMany(args)
            }
            Operation::FindDuplicates(mut args) => {
                for record in args.data.iter_mut().flatten() {
                    coerce_data(record, object);
                }
                Operation::FindDuplicates(args)
            }
            Operation::DeleteMany(mut args) => {
                coerce_filter(&mut args.filter, object);
                Operation::DeleteMany(args)
            }
            Operation::RestoreMany(mut args) => {
                coerce_filter(&mut args.filter, object);
                Operation::RestoreMany(args)
            }
            other @ (Operation::DeleteOne(_) | Operation::DestroyOne(_)) => other,
        })
    }
}

fn stamp_update(data: &mut Record, object: &ObjectMetadata, now: &Value) {
    if object.has_field(UPDATED_AT_FIELD) && !data.contains_key(UPDATED_AT_FIELD) {
        data.set(UPDATED_AT_FIELD, now.clone());
    }
    coerce_data(data, object);
}

fn is_numeric_field(object: &ObjectMetadata, name: &str) -> bool {
    object
        .field(name)
        .is_some_and(|field| field.field_type.is_numeric())
}

/// `"42"` -> `42`, `"1.5"` -> `1.5`; anything else is left alone
fn coerce_number(value: &mut Value) {
    let Value::String(text) = value else {
        return;
    };
    let trimmed = text.trim();
    let number = trimmed
        .parse::<i64>()
        .map(Number::from)
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(Number::from_f64));
    if let Some(number) = number {
        *value = Value::Number(number);
    }
}

fn coerce_data(record: &mut Record, object: &ObjectMetadata) {
    for (key, value) in record.iter_mut() {
        if is_numeric_field(object, key) {
            coerce_number(value);
        }
    }
}

fn coerce_filter(filter: &mut Value, object: &ObjectMetadata) {
    let Value::Object(conditions) = filter else {
        return;
    };
    for (key, condition) in conditions.iter_mut() {
        match key.as_str() {
            "and" | "or" => {
                if let Value::Array(items) = condition {
                    items.iter_mut().for_each(|item| coerce_filter(item, object));
                }
            }
            "not" => coerce_filter(condition, object),
            name if is_numeric_field(object, name) => coerce_condition(condition),
            _ => {}
        }
    }
}

fn coerce_condition(condition: &mut Value) {
    match condition {
        Value::Object(operators) => coerce_operators(operators),
        other => coerce_number(other),
    }
}

fn coerce_operators(operators: &mut Map<String, Value>) {
    for (operator, operand) in operators.iter_mut() {
        match (operator.as_str(), operand) {
            ("is", _) => {}
            (_, Value::Array(items)) => items.iter_mut().for_each(coerce_number),
            (_, operand) => coerce_number(operand),
        }
    }
}
