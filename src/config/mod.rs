//! Configuration loading and management

use crate::core::error::ConfigError;
use crate::core::metadata::{ObjectMetadata, ObjectMetadataMap};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of the query runner
///
/// Every key is optional in YAML:
///
/// ```yaml
/// webhook_retry_limit: 3
/// event_bus_capacity: 1024
/// default_page_size: 60
/// max_page_size: 200
/// max_relation_depth: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Retries of a failed webhook job after its first attempt
    pub webhook_retry_limit: u32,

    /// Envelopes buffered per event bus subscriber
    pub event_bus_capacity: usize,

    /// Page size of `findMany` when neither `first` nor `last` is given
    pub default_page_size: usize,

    pub max_page_size: usize,

    /// Relation nesting kept in results
    pub max_relation_depth: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            webhook_retry_limit: 3,
            event_bus_capacity: 1024,
            default_page_size: 60,
            max_page_size: 200,
            max_relation_depth: 5,
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

impl RunnerConfig {
    /// Load and validate configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_file(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_bus_capacity == 0 {
            return Err(invalid("event_bus_capacity", "must be greater than 0"));
        }
        if self.default_page_size == 0 {
            return Err(invalid("default_page_size", "must be greater than 0"));
        }
        if self.max_page_size == 0 {
            return Err(invalid("max_page_size", "must be greater than 0"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                format!(
                    "{} exceeds max_page_size {}",
                    self.default_page_size, self.max_page_size
                ),
            ));
        }
        Ok(())
    }
}

/// Object metadata of one workspace, as declared in YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub objects: Vec<ObjectMetadata>,
}

impl MetadataConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_file(path.as_ref())?)
    }

    /// Reject duplicate object names and relations to undeclared objects
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for object in &self.objects {
            if !seen.insert(object.name_singular.as_str()) {
                return Err(invalid(
                    "objects",
                    format!("object '{}' declared twice", object.name_singular),
                ));
            }
        }

        for object in &self.objects {
            for field in &object.fields {
                let Some(relation) = &field.relation else {
                    continue;
                };
                if !seen.contains(relation.target_object.as_str()) {
                    return Err(invalid(
                        "objects",
                        format!(
                            "field '{}.{}' targets unknown object '{}'",
                            object.name_singular, field.name, relation.target_object
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn into_map(self) -> ObjectMetadataMap {
        ObjectMetadataMap::from_collection(self.objects)
    }
}
