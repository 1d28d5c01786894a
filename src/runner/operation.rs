//! Operation kinds and their typed arguments

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::query::PaginationArgs;
use crate::core::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Name of an operation as exposed to clients (`findOne`, `createMany`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationName {
    FindOne,
    FindMany,
    FindDuplicates,
    CreateMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    DestroyOne,
    RestoreMany,
}

impl OperationName {
    pub const ALL: [OperationName; 10] = [
        OperationName::FindOne,
        OperationName::FindMany,
        OperationName::FindDuplicates,
        OperationName::CreateMany,
        OperationName::UpdateOne,
        OperationName::UpdateMany,
        OperationName::DeleteOne,
        OperationName::DeleteMany,
        OperationName::DestroyOne,
        OperationName::RestoreMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationName::FindOne => "findOne",
            OperationName::FindMany => "findMany",
            OperationName::FindDuplicates => "findDuplicates",
            OperationName::CreateMany => "createMany",
            OperationName::UpdateOne => "updateOne",
            OperationName::UpdateMany => "updateMany",
            OperationName::DeleteOne => "deleteOne",
            OperationName::DeleteMany => "deleteMany",
            OperationName::DestroyOne => "destroyOne",
            OperationName::RestoreMany => "restoreMany",
        }
    }

    /// Whether the operation changes persisted state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            OperationName::FindOne | OperationName::FindMany | OperationName::FindDuplicates
        )
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = QueryRunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| QueryRunnerError::UnknownOperation {
                operation: s.to_string(),
            })
    }
}

fn empty_filter() -> Value {
    json!({})
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOneArgs {
    #[serde(default = "empty_filter")]
    pub filter: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyArgs {
    #[serde(default = "empty_filter")]
    pub filter: Value,

    #[serde(default)]
    pub order_by: Value,

    #[serde(flatten)]
    pub pagination: PaginationArgs,
}

impl Default for FindManyArgs {
    fn default() -> Self {
        Self {
            filter: empty_filter(),
            order_by: Value::Null,
            pagination: PaginationArgs::default(),
        }
    }
}

/// Either existing record ids or candidate record data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindDuplicatesArgs {
    #[serde(default)]
    pub ids: Option<Vec<String>>,

    #[serde(default)]
    pub data: Option<Vec<Record>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManyArgs {
    pub data: Vec<Record>,

    #[serde(default)]
    pub upsert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOneArgs {
    pub data: Record,

    #[serde(default)]
    pub upsert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOneArgs {
    pub id: String,
    pub data: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManyArgs {
    #[serde(default = "empty_filter")]
    pub filter: Value,
    pub data: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOneArgs {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyArgs {
    #[serde(default = "empty_filter")]
    pub filter: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyOneArgs {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreManyArgs {
    #[serde(default = "empty_filter")]
    pub filter: Value,
}

/// An operation together with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    FindOne(FindOneArgs),
    FindMany(FindManyArgs),
    FindDuplicates(FindDuplicatesArgs),
    CreateMany(CreateManyArgs),
    UpdateOne(UpdateOneArgs),
    UpdateMany(UpdateManyArgs),
    DeleteOne(DeleteOneArgs),
    DeleteMany(DeleteManyArgs),
    DestroyOne(DestroyOneArgs),
    RestoreMany(RestoreManyArgs),
}

impl Operation {
    pub fn name(&self) -> OperationName {
        match self {
            Operation::FindOne(_) => OperationName::FindOne,
            Operation::FindMany(_) => OperationName::FindMany,
            Operation::FindDuplicates(_) => OperationName::FindDuplicates,
            Operation::CreateMany(_) => OperationName::CreateMany,
            Operation::UpdateOne(_) => OperationName::UpdateOne,
            Operation::UpdateMany(_) => OperationName::UpdateMany,
            Operation::DeleteOne(_) => OperationName::DeleteOne,
            Operation::DeleteMany(_) => OperationName::DeleteMany,
            Operation::DestroyOne(_) => OperationName::DestroyOne,
            Operation::RestoreMany(_) => OperationName::RestoreMany,
        }
    }

    /// Decode raw JSON arguments for `name`
    pub fn from_json(name: OperationName, args: Value) -> QueryRunnerResult<Self> {
        let args = if args.is_null() { json!({}) } else { args };
        Ok(match name {
            OperationName::FindOne => Operation::FindOne(serde_json::from_value(args)?),
            OperationName::FindMany => Operation::FindMany(serde_json::from_value(args)?),
            OperationName::FindDuplicates => {
                Operation::FindDuplicates(serde_json::from_value(args)?)
            }
            OperationName::CreateMany => Operation::CreateMany(serde_json::from_value(args)?),
            OperationName::UpdateOne => Operation::UpdateOne(serde_json::from_value(args)?),
            OperationName::UpdateMany => Operation::UpdateMany(serde_json::from_value(args)?),
            OperationName::DeleteOne => Operation::DeleteOne(serde_json::from_value(args)?),
            OperationName::DeleteMany => Operation::DeleteMany(serde_json::from_value(args)?),
            OperationName::DestroyOne => Operation::DestroyOne(serde_json::from_value(args)?),
            OperationName::RestoreMany => Operation::RestoreMany(serde_json::from_value(args)?),
        })
    }
}
