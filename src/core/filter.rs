//! Record filters and ordering
//!
//! Filters use the workspace API shape and are evaluated against flattened
//! storage rows:
//!
//! ```text
//! { "and": [ { "nameFirstName": { "eq": "Ada" } },
//!            { "or": [ { "createdAt": { "gte": "2024-01-01" } },
//!                      { "deletedAt": { "is": "NOT_NULL" } } ] } ] }
//! ```
//!
//! A bare value is shorthand for `eq`: `{ "city": "Paris" }`.

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::record::{DELETED_AT_FIELD, ID_FIELD};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;

/// Filter expression, see module docs
pub type RecordFilter = Value;

/// Filter matching a single id
pub fn id_filter(id: &uuid::Uuid) -> RecordFilter {
    json!({ ID_FIELD: { "eq": id.to_string() } })
}

/// Filter matching any of the given ids
pub fn ids_filter(ids: &[uuid::Uuid]) -> RecordFilter {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    json!({ ID_FIELD: { "in": ids } })
}

/// Combine filters with `and`, skipping empty ones
pub fn and_filters(filters: Vec<RecordFilter>) -> RecordFilter {
    let mut non_empty: Vec<Value> = filters.into_iter().filter(|f| !is_empty_filter(f)).collect();
    match non_empty.len() {
        0 => json!({}),
        1 => non_empty.remove(0),
        _ => json!({ "and": non_empty }),
    }
}

pub fn is_empty_filter(filter: &RecordFilter) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether a filter references the soft-delete column anywhere
pub fn references_deleted_at(filter: &RecordFilter) -> bool {
    match filter {
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key == DELETED_AT_FIELD || references_deleted_at(value)),
        Value::Array(items) => items.iter().any(references_deleted_at),
        _ => false,
    }
}

/// Evaluate a filter against a flattened row
pub fn matches(row: &Map<String, Value>, filter: &RecordFilter) -> QueryRunnerResult<bool> {
    let conditions = match filter {
        Value::Null => return Ok(true),
        Value::Object(map) => map,
        other => {
            return Err(QueryRunnerError::invalid_input(format!(
                "Filter must be an object, got {}",
                other
            )));
        }
    };

    for (key, condition) in conditions {
        let satisfied = match key.as_str() {
            "and" => {
                let mut all = true;
                for sub in as_filter_list(key, condition)? {
                    if !matches(row, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "or" => {
                let mut any = false;
                for sub in as_filter_list(key, condition)? {
                    if matches(row, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "not" => !matches(row, condition)?,
            column => matches_condition(row.get(column).unwrap_or(&Value::Null), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn as_filter_list<'a>(key: &str, value: &'a Value) -> QueryRunnerResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        QueryRunnerError::invalid_input(format!("'{}' filter expects an array", key))
    })
}

fn matches_condition(field: &Value, condition: &Value) -> QueryRunnerResult<bool> {
    let operators = match condition {
        Value::Object(ops) => ops,
        shorthand => return Ok(values_equal(field, shorthand)),
    };

    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "eq" => values_equal(field, operand),
            "neq" => !values_equal(field, operand),
            "in" => operand
                .as_array()
                .ok_or_else(|| QueryRunnerError::invalid_input("'in' expects an array"))?
                .iter()
                .any(|candidate| values_equal(field, candidate)),
            "gt" => compare_values(field, operand) == Some(Ordering::Greater),
            "gte" => matches!(
                compare_values(field, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "lt" => compare_values(field, operand) == Some(Ordering::Less),
            "lte" => matches!(
                compare_values(field, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            "like" => like(field, operand, false)?,
            "ilike" => like(field, operand, true)?,
            "is" => match operand.as_str() {
                Some("NULL") => field.is_null(),
                Some("NOT_NULL") => !field.is_null(),
                _ => {
                    return Err(QueryRunnerError::invalid_input(
                        "'is' expects NULL or NOT_NULL",
                    ));
                }
            },
            unknown => {
                return Err(QueryRunnerError::invalid_input(format!(
                    "Unknown filter operator '{}'",
                    unknown
                )));
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn like(field: &Value, pattern: &Value, case_insensitive: bool) -> QueryRunnerResult<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| QueryRunnerError::invalid_input("'like' expects a string pattern"))?;
    let Some(text) = field.as_str() else {
        return Ok(false);
    };

    let mut source = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    let regex = Regex::new(&source)
        .map_err(|e| QueryRunnerError::invalid_input(format!("Invalid pattern: {}", e)))?;
    Ok(regex.is_match(text))
}

/// Equality with numeric tolerance between integer and float encodings
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two scalar values, `None` when incomparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderByDirection {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl OrderByDirection {
    fn is_ascending(self) -> bool {
        matches!(
            self,
            OrderByDirection::AscNullsFirst | OrderByDirection::AscNullsLast
        )
    }

    fn nulls_first(self) -> bool {
        matches!(
            self,
            OrderByDirection::AscNullsFirst | OrderByDirection::DescNullsFirst
        )
    }
}

/// Ordered list of (column, direction) sort keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy(pub Vec<(String, OrderByDirection)>);

impl OrderBy {
    /// Parse `{col: dir}` or `[{col: dir}, ...]` over flattened columns
    pub fn parse(value: &Value) -> QueryRunnerResult<Self> {
        let mut keys = Vec::new();
        let items: Vec<&Value> = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().collect(),
            object @ Value::Object(_) => vec![object],
            other => {
                return Err(QueryRunnerError::invalid_input(format!(
                    "orderBy must be an object or an array, got {}",
                    other
                )));
            }
        };

        for item in items {
            let map = item
                .as_object()
                .ok_or_else(|| QueryRunnerError::invalid_input("orderBy entries must be objects"))?;
            for (column, direction) in map {
                let direction: OrderByDirection = serde_json::from_value(direction.clone())
                    .map_err(|_| {
                        QueryRunnerError::invalid_input(format!(
                            "Invalid order direction for '{}': {}",
                            column, direction
                        ))
                    })?;
                keys.push((column.clone(), direction));
            }
        }
        Ok(Self(keys))
    }

    /// Append an ascending `id` key so pagination is deterministic
    pub fn with_id_tiebreak(mut self) -> Self {
        if !self.0.iter().any(|(column, _)| column == ID_FIELD) {
            self.0
                .push((ID_FIELD.to_string(), OrderByDirection::AscNullsFirst));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare two rows according to the sort keys
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for (column, direction) in &self.0 {
            let left = a.get(column).unwrap_or(&Value::Null);
            let right = b.get(column).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) if direction.nulls_first() => Ordering::Less,
                (true, false) => Ordering::Greater,
                (false, true) if direction.nulls_first() => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let natural = compare_values(left, right).unwrap_or(Ordering::Equal);
                    if direction.is_ascending() {
                        natural
                    } else {
                        natural.reverse()
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_eq_and_shorthand() {
        let r = row(json!({"name": "Acme", "employees": 10}));
        assert!(matches(&r, &json!({"name": {"eq": "Acme"}})).unwrap());
        assert!(matches(&r, &json!({"name": "Acme"})).unwrap());
        assert!(matches(&r, &json!({"employees": {"eq": 10.0}})).unwrap());
        assert!(!matches(&r, &json!({"name": {"neq": "Acme"}})).unwrap());
    }

    #[test]
    fn test_comparisons_and_in() {
        let r = row(json!({"employees": 10, "city": "Paris"}));
        assert!(matches(&r, &json!({"employees": {"gt": 5, "lte": 10}})).unwrap());
        assert!(!matches(&r, &json!({"employees": {"lt": 10}})).unwrap());
        assert!(matches(&r, &json!({"city": {"in": ["Paris", "Lyon"]}})).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let r = row(json!({"name": "Acme", "city": "Paris"}));
        let filter = json!({
            "or": [{"name": {"eq": "Other"}}, {"and": [{"city": "Paris"}, {"not": {"name": "Foo"}}]}]
        });
        assert!(matches(&r, &filter).unwrap());
    }

    #[test]
    fn test_like_and_is() {
        let r = row(json!({"name": "Acme Inc", "deletedAt": null}));
        assert!(matches(&r, &json!({"name": {"like": "Acme%"}})).unwrap());
        assert!(!matches(&r, &json!({"name": {"like": "acme%"}})).unwrap());
        assert!(matches(&r, &json!({"name": {"ilike": "acme%"}})).unwrap());
        assert!(matches(&r, &json!({"deletedAt": {"is": "NULL"}})).unwrap());
        assert!(matches(&r, &json!({"missing": {"is": "NULL"}})).unwrap());
    }

    #[test]
    fn test_unknown_operator_is_invalid_input() {
        let r = row(json!({"name": "Acme"}));
        let err = matches(&r, &json!({"name": {"startsWithX": "A"}})).unwrap_err();
        assert!(matches!(err, QueryRunnerError::InvalidInput { .. }));
    }

    #[test]
    fn test_references_deleted_at() {
        assert!(references_deleted_at(&json!({"and": [{"deletedAt": {"is": "NOT_NULL"}}]})));
        assert!(!references_deleted_at(&json!({"name": {"eq": "x"}})));
    }

    #[test]
    fn test_order_by_nulls_and_direction() {
        let order = OrderBy::parse(&json!([{"rank": "DescNullsLast"}])).unwrap();
        let mut rows = vec![
            row(json!({"rank": 1})),
            row(json!({"rank": null})),
            row(json!({"rank": 3})),
        ];
        rows.sort_by(|a, b| order.compare(a, b));
        assert_eq!(rows[0]["rank"], 3);
        assert_eq!(rows[1]["rank"], 1);
        assert!(rows[2]["rank"].is_null());
    }

    #[test]
    fn test_order_by_invalid_direction() {
        assert!(OrderBy::parse(&json!({"rank": "Sideways"})).is_err());
    }

    #[test]
    fn test_and_filters_skips_empty() {
        assert_eq!(and_filters(vec![json!({}), json!({"a": 1})]), json!({"a": 1}));
        assert_eq!(and_filters(vec![]), json!({}));
    }
}
