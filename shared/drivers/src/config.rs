use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::validation::{require, Validate, ValidationError};

/// One syncable entity of a source, e.g. `contacts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Cron expression consumed by the external scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Destination table, falling back to the collection name
    pub fn table_name(&self) -> &str {
        match self.table_name.as_deref() {
            Some(table) if !table.trim().is_empty() => table,
            _ => &self.name,
        }
    }
}

impl Validate for CollectionConfig {
    const NAME: &'static str = "Collection";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "collection name is required")
    }
}

/// A configured source: connector type plus an opaque connector config
/// decoded later into the connector's typed config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub source_id: String,
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<CollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl SourceConfig {
    pub fn new(source_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_type: source_type.into(),
            ..Default::default()
        }
    }

    pub fn with_collection(mut self, collection: CollectionConfig) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn with_config(mut self, config: serde_json::Map<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// Decodes the opaque connector config. Unknown fields are ignored;
    /// missing required fields are left to the typed config's `validate`.
    pub fn decode_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.config.clone()))
    }
}

impl Validate for SourceConfig {
    const NAME: &'static str = "Source";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.source_id, "source_id is required")?;
        require(&self.source_type, "source type is required")?;

        let mut seen = HashSet::new();
        for collection in &self.collections {
            collection.validate()?;
            if !seen.insert(collection.name.as_str()) {
                return Err(ValidationError(format!(
                    "collection name must be unique within source {}: {}",
                    self.source_id, collection.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> SourceConfig {
        SourceConfig::new("crm", "stoplight")
            .with_collection(CollectionConfig::new("contacts").with_table_name("crm_contacts"))
            .with_config(
                json!({"access_token": "t", "api_version": "2021-07-28"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
    }

    #[test]
    fn test_table_name_falls_back_to_collection_name() {
        assert_eq!(CollectionConfig::new("contacts").table_name(), "contacts");
        let collection = CollectionConfig::new("contacts").with_table_name("crm_contacts");
        assert_eq!(collection.table_name(), "crm_contacts");
    }

    #[test]
    fn test_missing_fields_are_named() {
        let err = SourceConfig::new("", "stoplight").validate().unwrap_err();
        assert!(err.to_string().contains("source_id"));

        let err = SourceConfig::new("crm", "").validate().unwrap_err();
        assert!(err.to_string().contains("type"));

        let err = source()
            .with_collection(CollectionConfig::new(""))
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "collection name is required");
    }

    #[test]
    fn test_duplicate_collection_rejected() {
        let err = source()
            .with_collection(CollectionConfig::new("contacts"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[test]
    fn test_round_trip_validates_identically() {
        let original = source();
        assert!(original.validate().is_ok());

        let wire = serde_json::to_string(&original).unwrap();
        let decoded: SourceConfig = serde_json::from_str(&wire).unwrap();

        assert_eq!(decoded, original);
        assert!(decoded.validate().is_ok());

        let broken = SourceConfig::new("", "stoplight");
        let wire = serde_json::to_string(&broken).unwrap();
        let decoded: SourceConfig = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded.validate(), broken.validate());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let decoded: SourceConfig = serde_json::from_value(json!({
            "source_id": "crm",
            "type": "stoplight",
            "something_new": true,
            "config": {"access_token": "t"}
        }))
        .unwrap();

        assert_eq!(decoded.source_type, "stoplight");
        assert!(decoded.validate().is_ok());
    }
}
