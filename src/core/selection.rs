//! Field selection: from a client-requested field tree to storage directives

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::metadata::{
    FieldMetadata, ObjectMetadata, ObjectMetadataMap, RelationKind, composite_column,
};
use crate::core::record::{ID_FIELD, SYSTEM_COLUMNS, TYPENAME_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Nested set of requested fields
///
/// `{"name": {}, "company": {"name": {}}}` requests `name` plus the `name`
/// of the related company. Leaves are empty trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionTree(pub BTreeMap<String, SelectionTree>);

impl SelectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; non-object leaves (`true`, `null`) are leaves
    pub fn from_json(value: &Value) -> QueryRunnerResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => {
                let mut tree = BTreeMap::new();
                for (key, child) in map {
                    let child = match child {
                        Value::Object(_) => Self::from_json(child)?,
                        _ => Self::default(),
                    };
                    tree.insert(key.clone(), child);
                }
                Ok(Self(tree))
            }
            other => Err(QueryRunnerError::invalid_input(format!(
                "Selection must be an object, got {}",
                other
            ))),
        }
    }

    /// Add a leaf or subtree
    pub fn with(mut self, field: impl Into<String>, subtree: SelectionTree) -> Self {
        self.0.insert(field.into(), subtree);
        self
    }

    pub fn field(&self, name: &str) -> Option<&SelectionTree> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the selection set of the first root field of a GraphQL query
    ///
    /// `{ people { edges { node { id name { firstName } } } } }` yields the
    /// tree under `people`.
    #[cfg(feature = "graphql")]
    pub fn from_graphql(query: &str) -> QueryRunnerResult<Self> {
        use graphql_parser::query::{Definition, OperationDefinition, Selection, parse_query};

        fn collect(items: &[Selection<'_, String>]) -> SelectionTree {
            let mut tree = BTreeMap::new();
            for item in items {
                if let Selection::Field(field) = item {
                    tree.insert(field.name.clone(), collect(&field.selection_set.items));
                }
            }
            SelectionTree(tree)
        }

        let doc = parse_query::<String>(query)
            .map_err(|e| QueryRunnerError::invalid_input(format!("Failed to parse query: {:?}", e)))?;

        let root = doc
            .definitions
            .iter()
            .find_map(|def| match def {
                Definition::Operation(OperationDefinition::Query(q)) => Some(&q.selection_set),
                Definition::Operation(OperationDefinition::Mutation(m)) => Some(&m.selection_set),
                Definition::Operation(OperationDefinition::SelectionSet(s)) => Some(s),
                _ => None,
            })
            .ok_or_else(|| QueryRunnerError::invalid_input("No operation found in query"))?;

        match root.items.first() {
            Some(Selection::Field(field)) => Ok(collect(&field.selection_set.items)),
            _ => Ok(SelectionTree::default()),
        }
    }
}

/// How a relation is joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDirective {
    pub target_object: String,
    pub kind: RelationKind,
    pub directives: SelectDirectives,
}

/// Storage-level select and relation directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectDirectives {
    /// Columns to project
    pub select: BTreeSet<String>,
    /// Relations to load, keyed by relation field name
    pub relations: BTreeMap<String, RelationDirective>,
}

/// Translates selection trees into [`SelectDirectives`]
pub struct FieldSelector<'a> {
    metadata_map: &'a ObjectMetadataMap,
    max_depth: usize,
}

impl<'a> FieldSelector<'a> {
    pub fn new(metadata_map: &'a ObjectMetadataMap, max_depth: usize) -> Self {
        Self {
            metadata_map,
            max_depth,
        }
    }

    /// Parse a selection for `object`
    ///
    /// An empty tree selects every column of the object, system columns
    /// included, and no relation.
    pub fn parse_selected_fields(
        &self,
        object: &ObjectMetadata,
        tree: &SelectionTree,
    ) -> QueryRunnerResult<SelectDirectives> {
        self.parse_at_depth(object, tree, 0)
    }

    fn parse_at_depth(
        &self,
        object: &ObjectMetadata,
        tree: &SelectionTree,
        depth: usize,
    ) -> QueryRunnerResult<SelectDirectives> {
        if tree.is_empty() {
            let mut select: BTreeSet<String> = object.columns().into_iter().collect();
            select.extend(SYSTEM_COLUMNS.iter().map(|c| c.to_string()));
            return Ok(SelectDirectives {
                select,
                relations: BTreeMap::new(),
            });
        }

        let mut directives = SelectDirectives::default();
        directives.select.insert(ID_FIELD.to_string());

        for (name, subtree) in &tree.0 {
            if name == TYPENAME_FIELD {
                continue;
            }
            if object.field(name).is_none() && SYSTEM_COLUMNS.contains(&name.as_str()) {
                directives.select.insert(name.clone());
                continue;
            }
            let field = object.field(name).ok_or_else(|| {
                QueryRunnerError::invalid_input(format!(
                    "Field '{}' not found in object '{}'",
                    name, object.name_singular
                ))
            })?;

            match &field.relation {
                Some(relation) => {
                    if depth + 1 > self.max_depth {
                        return Err(QueryRunnerError::invalid_input(format!(
                            "Selection exceeds maximum relation depth of {}",
                            self.max_depth
                        )));
                    }
                    let target = self.metadata_map.get_or_throw(&relation.target_object)?;
                    let nested = match relation.kind {
                        RelationKind::ManyToOne { ref join_column } => {
                            directives.select.insert(join_column.clone());
                            subtree.clone()
                        }
                        RelationKind::OneToMany { .. } => unwrap_connection(subtree),
                    };
                    directives.relations.insert(
                        name.clone(),
                        RelationDirective {
                            target_object: relation.target_object.clone(),
                            kind: relation.kind.clone(),
                            directives: self.parse_at_depth(&target, &nested, depth + 1)?,
                        },
                    );
                }
                None => select_field(&mut directives.select, field, subtree),
            }
        }

        Ok(directives)
    }
}

fn select_field(select: &mut BTreeSet<String>, field: &FieldMetadata, subtree: &SelectionTree) {
    match field.field_type.composite_properties() {
        Some(properties) => {
            let requested: Vec<&&str> = properties
                .iter()
                .filter(|p| subtree.is_empty() || subtree.field(p).is_some())
                .collect();
            for property in requested {
                select.insert(composite_column(&field.name, property));
            }
        }
        None => {
            select.insert(field.name.clone());
        }
    }
}

/// `{edges: {node: {...}}}` -> `{...}`; other shapes pass through
fn unwrap_connection(tree: &SelectionTree) -> SelectionTree {
    tree.field("edges")
        .and_then(|edges| edges.field("node"))
        .cloned()
        .unwrap_or_else(|| tree.clone())
}
