//! Dynamic records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};
use uuid::Uuid;

/// Column holding the record identifier
pub const ID_FIELD: &str = "id";

/// Column holding the soft-delete marker
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// Type discriminator added to formatted records
pub const TYPENAME_FIELD: &str = "__typename";

pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Columns every object carries even when its metadata does not list them
pub const SYSTEM_COLUMNS: [&str; 4] = [
    ID_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    DELETED_AT_FIELD,
];

/// One entity instance: field name -> value
///
/// Records are schemaless at this layer; their shape is given by the
/// object metadata they were loaded for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value, `None` if it is not an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// The record identifier, if present and well-formed
    pub fn id(&self) -> Option<Uuid> {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn set_id(&mut self, id: Uuid) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    /// Soft-delete marker; `None` when the column is absent or null
    pub fn deleted_at(&self) -> Option<&str> {
        self.0.get(DELETED_AT_FIELD).and_then(Value::as_str)
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
