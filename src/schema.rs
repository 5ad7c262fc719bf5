//! Record schemas and the schema source
//!
//! A [`FieldSchema`] describes one record tag: its ordered fixed fields,
//! which of them are required, and the fields of its optional extensible
//! group. The engine only consumes schemas through [`SchemaSource`];
//! [`SchemaCatalog`] is the in-crate implementation, loadable from JSON:
//!
//! ```json
//! {
//!   "version": "24.2.0",
//!   "schemas": [
//!     { "tag": "Zone", "field_names": ["Multiplier"], "required": [] },
//!     { "tag": "ZoneList", "field_names": [], "extensible_fields": ["Zone Name"] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::record::TargetRecord;

/// Field layout of one record tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Record type tag (e.g. "Zone", "BuildingSurface:Detailed")
    pub tag: String,
    /// Ordered fixed fields
    #[serde(default)]
    pub field_names: Vec<String>,
    /// Indices into `field_names` that must be non-empty
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required: BTreeSet<usize>,
    /// Fields of one extensible-group tuple (empty = not extensible)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensible_fields: Vec<String>,
}

impl FieldSchema {
    /// Create a schema with the given fixed fields
    pub fn new<I, S>(tag: impl Into<String>, field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag: tag.into(),
            field_names: field_names.into_iter().map(Into::into).collect(),
            required: BTreeSet::new(),
            extensible_fields: Vec::new(),
        }
    }

    /// Mark fields as required by index
    pub fn with_required(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.required.extend(indices);
        self
    }

    /// Define the extensible group tuple
    pub fn with_extensible_group<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensible_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Number of fixed fields
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Width of one extensible-group tuple, if the tag has one
    pub fn extensible_group_arity(&self) -> Option<usize> {
        match self.extensible_fields.len() {
            0 => None,
            n => Some(n),
        }
    }

    /// Index of a fixed field (case-insensitive)
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.field_names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(field))
    }

    /// Index of a field inside the extensible tuple (case-insensitive)
    pub fn group_index_of(&self, field: &str) -> Option<usize> {
        self.extensible_fields
            .iter()
            .position(|name| name.eq_ignore_ascii_case(field))
    }

    pub fn is_required(&self, index: usize) -> bool {
        self.required.contains(&index)
    }

    /// Names of the required fields, in field order
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .filter_map(|&i| self.field_names.get(i).map(String::as_str))
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(BridgeError::InvalidSchema {
                tag: self.tag.clone(),
                reason: "empty tag".to_string(),
            });
        }
        if let Some(&bad) = self.required.iter().find(|&&i| i >= self.field_names.len()) {
            return Err(BridgeError::InvalidSchema {
                tag: self.tag.clone(),
                reason: format!(
                    "required index {} out of range ({} fields)",
                    bad,
                    self.field_names.len()
                ),
            });
        }
        Ok(())
    }
}

/// Where the engine gets record layouts from
pub trait SchemaSource {
    /// Schema for a tag
    fn schema_for(&self, tag: &str) -> Option<Arc<FieldSchema>>;

    /// A canonical empty record of a tag: every fixed field empty, no groups
    fn empty_record_of(&self, tag: &str) -> Option<TargetRecord> {
        self.schema_for(tag).map(TargetRecord::new)
    }
}

/// On-disk catalog layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default)]
    schemas: Vec<FieldSchema>,
}

/// In-memory schema catalog keyed by tag
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    version: Option<Version>,
    schemas: BTreeMap<String, Arc<FieldSchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Version of the record format this catalog describes
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Register a schema. Tags are unique.
    pub fn insert(&mut self, schema: FieldSchema) -> Result<()> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.tag) {
            return Err(BridgeError::SchemaExists(schema.tag));
        }
        self.schemas.insert(schema.tag.clone(), Arc::new(schema));
        Ok(())
    }

    /// Builder-style insert
    pub fn with_schema(mut self, schema: FieldSchema) -> Result<Self> {
        self.insert(schema)?;
        Ok(self)
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<FieldSchema>> {
        self.schemas.get(tag)
    }

    /// All tags, sorted
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Parse a catalog from JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let mut catalog = Self::new();
        if let Some(version) = file.version {
            let version = version.strip_prefix('v').unwrap_or(&version);
            catalog.version = Some(Version::parse(version)?);
        }
        for schema in file.schemas {
            catalog.insert(schema)?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize back to the catalog JSON layout
    pub fn to_json(&self) -> Result<String> {
        let file = CatalogFile {
            version: self.version.as_ref().map(Version::to_string),
            schemas: self.schemas.values().map(|s| s.as_ref().clone()).collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}

impl SchemaSource for SchemaCatalog {
    fn schema_for(&self, tag: &str) -> Option<Arc<FieldSchema>> {
        self.schemas.get(tag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_list() -> FieldSchema {
        FieldSchema::new("ZoneList", Vec::<String>::new()).with_extensible_group(["Zone Name"])
    }

    #[test]
    fn test_arity_and_lookup() {
        let schema = FieldSchema::new("Surface", ["Surface Type", "Construction Name", "Zone Name"])
            .with_required([1, 2]);
        assert_eq!(schema.field_count(), 3);
        assert_eq!(schema.extensible_group_arity(), None);
        assert_eq!(schema.index_of("zone name"), Some(2));
        assert_eq!(
            schema.required_names().collect::<Vec<_>>(),
            vec!["Construction Name", "Zone Name"]
        );
        assert_eq!(zone_list().extensible_group_arity(), Some(1));
    }

    #[test]
    fn test_validate_rejects_out_of_range_required() {
        let schema = FieldSchema::new("Zone", ["Multiplier"]).with_required([3]);
        assert!(matches!(schema.validate(), Err(BridgeError::InvalidSchema { .. })));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(zone_list()).unwrap();
        assert!(matches!(catalog.insert(zone_list()), Err(BridgeError::SchemaExists(_))));
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let json = r#"{
            "version": "v24.2.0",
            "schemas": [
                { "tag": "Zone", "field_names": ["Multiplier"] },
                { "tag": "ZoneList", "extensible_fields": ["Zone Name"] }
            ]
        }"#;
        let catalog = SchemaCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.version().unwrap().to_string(), "24.2.0");

        let again = SchemaCatalog::from_json_str(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(again.tags().collect::<Vec<_>>(), vec!["Zone", "ZoneList"]);
    }

    #[test]
    fn test_empty_record_of() {
        let catalog = SchemaCatalog::new()
            .with_schema(FieldSchema::new("Zone", ["Multiplier", "Ceiling Height"]))
            .unwrap();
        let record = catalog.empty_record_of("Zone").unwrap();
        assert_eq!(record.tag(), "Zone");
        assert_eq!(record.fields().len(), 2);
        assert!(record.fields().iter().all(|f| f.is_empty()));
        assert!(catalog.empty_record_of("Nope").is_none());
    }
}
