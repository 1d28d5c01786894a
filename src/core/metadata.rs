//! Object metadata: tenant-defined entity descriptions
//!
//! An [`ObjectMetadata`] describes one entity type of a workspace (its names,
//! fields and relations). Metadata is loaded once per request and shared
//! read-only through an [`ObjectMetadataMap`].

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMetadataType {
    Uuid,
    Text,
    Number,
    Numeric,
    Boolean,
    DateTime,
    Position,
    Select,
    RawJson,
    Emails,
    FullName,
    Links,
    Currency,
    Relation,
}

impl FieldMetadataType {
    /// Sub-field names of a composite type, `None` for scalar types
    pub fn composite_properties(&self) -> Option<&'static [&'static str]> {
        match self {
            FieldMetadataType::Emails => Some(&["primaryEmail", "additionalEmails"]),
            FieldMetadataType::FullName => Some(&["firstName", "lastName"]),
            FieldMetadataType::Links => {
                Some(&["primaryLinkUrl", "primaryLinkLabel", "secondaryLinks"])
            }
            FieldMetadataType::Currency => Some(&["amountMicros", "currencyCode"]),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite_properties().is_some()
    }

    /// Whether string inputs should be coerced to JSON numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldMetadataType::Number | FieldMetadataType::Numeric | FieldMetadataType::Position
        )
    }
}

/// Storage column holding one sub-field of a composite field
///
/// `composite_column("emails", "primaryEmail") == "emailsPrimaryEmail"`
pub fn composite_column(field: &str, property: &str) -> String {
    let mut chars = property.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", field, first.to_ascii_uppercase(), chars.as_str()),
        None => field.to_string(),
    }
}

/// Direction of a relation, seen from the object owning the field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// `record[join_column]` holds the id of the target record
    ManyToOne {
        #[serde(rename = "joinColumn")]
        join_column: String,
    },
    /// Target records hold this record's id in `inverse_join_column`
    OneToMany {
        #[serde(rename = "inverseJoinColumn")]
        inverse_join_column: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    pub target_object: String,
    pub kind: RelationKind,
}

/// One field of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldMetadataType,

    #[serde(default = "default_nullable")]
    pub is_nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationMetadata>,
}

fn default_nullable() -> bool {
    true
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, field_type: FieldMetadataType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_nullable: true,
            relation: None,
        }
    }

    pub fn many_to_one(
        name: impl Into<String>,
        target_object: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldMetadataType::Relation,
            is_nullable: true,
            relation: Some(RelationMetadata {
                target_object: target_object.into(),
                kind: RelationKind::ManyToOne {
                    join_column: join_column.into(),
                },
            }),
        }
    }

    pub fn one_to_many(
        name: impl Into<String>,
        target_object: impl Into<String>,
        inverse_join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldMetadataType::Relation,
            is_nullable: true,
            relation: Some(RelationMetadata {
                target_object: target_object.into(),
                kind: RelationKind::OneToMany {
                    inverse_join_column: inverse_join_column.into(),
                },
            }),
        }
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Storage columns backing this field (none for relations)
    pub fn columns(&self) -> Vec<String> {
        if self.is_relation() {
            return Vec::new();
        }
        match self.field_type.composite_properties() {
            Some(properties) => properties
                .iter()
                .map(|p| composite_column(&self.name, p))
                .collect(),
            None => vec![self.name.clone()],
        }
    }
}

/// Description of one tenant-defined entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name_singular: String,

    /// Derived from `name_singular` when omitted
    #[serde(default)]
    pub name_plural: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Remote objects are proxied from an external source and read-only
    #[serde(default)]
    pub is_remote: bool,

    pub fields: Vec<FieldMetadata>,

    /// Groups of fields that, when all equal, mark two records as duplicates
    #[serde(default)]
    pub duplicate_criteria: Vec<Vec<String>>,
}

impl ObjectMetadata {
    pub fn new(name_singular: impl Into<String>, fields: Vec<FieldMetadata>) -> Self {
        let name_singular = name_singular.into();
        Self {
            id: Uuid::new_v4(),
            name_plural: pluralize(&name_singular),
            name_singular,
            label: None,
            is_remote: false,
            fields,
            duplicate_criteria: Vec::new(),
        }
    }

    pub fn with_duplicate_criteria(mut self, criteria: Vec<Vec<&str>>) -> Self {
        self.duplicate_criteria = criteria
            .into_iter()
            .map(|group| group.into_iter().map(str::to_string).collect())
            .collect();
        self
    }

    pub fn remote(mut self) -> Self {
        self.is_remote = true;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Every storage column of the object (relations excluded)
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().flat_map(FieldMetadata::columns).collect()
    }

    /// GraphQL-style type name (`person` -> `Person`)
    pub fn type_name(&self) -> String {
        let mut chars = self.name_singular.chars();
        match chars.next() {
            Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => String::new(),
        }
    }

    fn normalized(mut self) -> Self {
        if self.name_plural.is_empty() {
            self.name_plural = pluralize(&self.name_singular);
        }
        self
    }
}

/// Name-keyed index over a metadata collection
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadataMap {
    objects: IndexMap<String, Arc<ObjectMetadata>>,
}

impl ObjectMetadataMap {
    /// Build the map from a collection of descriptors, keyed by singular name
    pub fn from_collection(collection: impl IntoIterator<Item = ObjectMetadata>) -> Self {
        let objects = collection
            .into_iter()
            .map(|object| {
                let object = object.normalized();
                (object.name_singular.clone(), Arc::new(object))
            })
            .collect();
        Self { objects }
    }

    pub fn get(&self, name_singular: &str) -> Option<&Arc<ObjectMetadata>> {
        self.objects.get(name_singular)
    }

    /// Resolve an object or fail with `MetadataNotFound`
    pub fn get_or_throw(&self, name_singular: &str) -> QueryRunnerResult<Arc<ObjectMetadata>> {
        self.objects
            .get(name_singular)
            .cloned()
            .ok_or_else(|| QueryRunnerError::MetadataNotFound {
                object: name_singular.to_string(),
            })
    }

    /// Find an object by its plural name
    pub fn get_by_plural(&self, name_plural: &str) -> Option<&Arc<ObjectMetadata>> {
        self.objects.values().find(|o| o.name_plural == name_plural)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }
}

/// English plural of an object name (`company` -> `companies`)
pub fn pluralize(singular: &str) -> String {
    const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];

    if singular.is_empty() {
        return String::new();
    }
    if let Some(stem) = singular.strip_suffix('y')
        && !stem.is_empty()
        && !stem.ends_with(VOWELS)
    {
        return format!("{}ies", stem);
    }
    if ["s", "sh", "ch", "x", "z"]
        .iter()
        .any(|suffix| singular.ends_with(suffix))
    {
        return format!("{}es", singular);
    }
    format!("{}s", singular)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> ObjectMetadata {
        ObjectMetadata::new(
            "person",
            vec![
                FieldMetadata::new("id", FieldMetadataType::Uuid),
                FieldMetadata::new("name", FieldMetadataType::FullName),
                FieldMetadata::new("emails", FieldMetadataType::Emails),
                FieldMetadata::new("companyId", FieldMetadataType::Uuid),
                FieldMetadata::many_to_one("company", "company", "companyId"),
            ],
        )
    }

    #[test]
    fn test_composite_column_naming() {
        assert_eq!(composite_column("emails", "primaryEmail"), "emailsPrimaryEmail");
        assert_eq!(composite_column("name", "firstName"), "nameFirstName");
    }

    #[test]
    fn test_object_columns_skip_relations() {
        let columns = person().columns();
        assert!(columns.contains(&"nameFirstName".to_string()));
        assert!(columns.contains(&"emailsAdditionalEmails".to_string()));
        assert!(columns.contains(&"companyId".to_string()));
        assert!(!columns.contains(&"company".to_string()));
    }

    #[test]
    fn test_metadata_map_lookup() {
        let map = ObjectMetadataMap::from_collection(vec![person()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_or_throw("person").unwrap().name_plural, "persons");
        assert!(map.get_by_plural("persons").is_some());

        let err = map.get_or_throw("opportunity").unwrap_err();
        assert!(matches!(err, QueryRunnerError::MetadataNotFound { .. }));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("survey"), "surveys");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("opportunity"), "opportunities");
        assert_eq!(pluralize("note"), "notes");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(person().type_name(), "Person");
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
nameSingular: company
fields:
  - name: id
    type: UUID
  - name: domainName
    type: LINKS
  - name: people
    type: RELATION
    relation:
      targetObject: person
      kind:
        type: ONE_TO_MANY
        inverseJoinColumn: companyId
duplicateCriteria:
  - [name]
"#;
        let object: ObjectMetadata = serde_yaml::from_str(yaml).unwrap();
        let map = ObjectMetadataMap::from_collection(vec![object]);
        let company = map.get_or_throw("company").unwrap();
        assert_eq!(company.name_plural, "companies");
        assert!(company.field("people").unwrap().is_relation());
        assert_eq!(company.duplicate_criteria, vec![vec!["name".to_string()]]);
    }
}
