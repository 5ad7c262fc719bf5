//! Schema-driven generic domain
//!
//! [`GenericObject`] is a data-only domain object: a variant name, an
//! optional name, named values and ordered group tuples. Its rules need no
//! per-type code. Values are matched to schema fields by name and group
//! tuples become extensible groups, so any catalog can be driven from a
//! JSON model file:
//!
//! ```json
//! {
//!   "objects": [
//!     {
//!       "handle": "7d0c5a52-3d3e-4c53-9c8e-0f3c0b7c2a11",
//!       "variant": "Zone",
//!       "name": "Office",
//!       "values": { "Multiplier": { "kind": "integer", "value": 2 } }
//!     }
//!   ]
//! }
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{BridgeConfig, MappingConfig};
use crate::context::TranslationContext;
use crate::dispatch::{Dispatch, DispatchEntry};
use crate::error::{BridgeError, MappingError, Result};
use crate::groups::append_group;
use crate::handle::Handle;
use crate::model::{DomainObject, ObjectStore};
use crate::output::TranslationReport;
use crate::record::{FieldValue, TargetRecord};
use crate::reverse::{LinkResolver, ReverseReport, ReverseTable, ReverseTranslator};
use crate::scheduler::PullScheduler;
use crate::schema::{SchemaCatalog, SchemaSource};

/// A value of a generic object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GenericValue {
    #[default]
    Empty,
    /// Reference to another object
    Ref(Handle),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl GenericValue {
    pub fn as_ref_handle(&self) -> Option<Handle> {
        match self {
            GenericValue::Ref(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Data-only domain object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericObject {
    #[serde(default = "Handle::new")]
    pub handle: Handle,
    pub variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, GenericValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Vec<GenericValue>>,
}

impl GenericObject {
    pub fn new(variant: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            variant: variant.into(),
            name: None,
            values: BTreeMap::new(),
            groups: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: GenericValue) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn with_group(mut self, tuple: Vec<GenericValue>) -> Self {
        self.groups.push(tuple);
        self
    }
}

impl DomainObject for GenericObject {
    type Variant = String;

    fn handle(&self) -> Handle {
        self.handle
    }

    fn variant(&self) -> String {
        self.variant.clone()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn references(&self) -> Vec<Handle> {
        self.values
            .values()
            .chain(self.groups.iter().flatten())
            .filter_map(GenericValue::as_ref_handle)
            .collect()
    }
}

/// On-disk model file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericModel {
    #[serde(default)]
    pub objects: Vec<GenericObject>,
}

impl GenericModel {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_store(store: &ObjectStore<GenericObject>) -> Self {
        Self {
            objects: store.iter().cloned().collect(),
        }
    }

    /// Build a store. Repeated handles are an error.
    pub fn into_store(self) -> Result<ObjectStore<GenericObject>> {
        let mut store = ObjectStore::new();
        for object in self.objects {
            store.insert(object)?;
        }
        Ok(store)
    }
}

// =============================================================================
// Forward
// =============================================================================

/// Variant -> tag through `[[mapping]]`, falling back to a schema with the
/// variant's own name
pub struct GenericDispatch<'a> {
    schemas: &'a dyn SchemaSource,
    mapping: MappingConfig,
}

impl<'a> GenericDispatch<'a> {
    pub fn new(schemas: &'a dyn SchemaSource, mapping: MappingConfig) -> Self {
        Self { schemas, mapping }
    }

    /// Tag a variant maps to, if any
    pub fn tag_for(&self, variant: &str) -> Option<String> {
        match self.mapping.tag_for(variant) {
            Some(tag) => Some(tag.to_string()),
            None => self
                .schemas
                .schema_for(variant)
                .map(|schema| schema.tag.clone()),
        }
    }
}

impl Dispatch<GenericObject> for GenericDispatch<'_> {
    fn entry(&self, object: &GenericObject) -> Option<DispatchEntry<GenericObject>> {
        self.tag_for(&object.variant)
            .map(|tag| DispatchEntry::new(Cow::Owned(tag), translate_generic))
    }
}

fn forward_value(
    value: &GenericValue,
    ctx: &mut TranslationContext<'_, GenericObject>,
) -> Result<FieldValue> {
    Ok(match value {
        GenericValue::Empty => FieldValue::Empty,
        GenericValue::Ref(handle) => ctx.reference(Some(*handle))?,
        GenericValue::Integer(i) => FieldValue::Integer(*i),
        GenericValue::Real(r) => FieldValue::Real(*r),
        GenericValue::Text(s) => FieldValue::Text(s.clone()),
    })
}

/// Mapping rule for every generic object
pub fn translate_generic(
    object: &GenericObject,
    ctx: &mut TranslationContext<'_, GenericObject>,
) -> std::result::Result<TargetRecord, MappingError> {
    let tag = ctx
        .current_tag()
        .map(str::to_string)
        .unwrap_or_else(|| object.variant.clone());
    let mut record = ctx.create_named_record(&tag, object)?;

    for (field, value) in &object.values {
        let value = forward_value(value, ctx)?;
        record.set(field, value)?;
    }
    for tuple in &object.groups {
        let values = tuple
            .iter()
            .map(|v| forward_value(v, ctx))
            .collect::<Result<Vec<_>>>()?;
        append_group(&mut record, values)?;
    }

    if let Some(field) = record.missing_required().into_iter().next() {
        return Err(MappingError::missing(field));
    }
    Ok(record)
}

/// Translate a whole generic model with the config's options, naming and mappings
pub fn translate_generic_model(
    store: &ObjectStore<GenericObject>,
    catalog: &SchemaCatalog,
    config: &BridgeConfig,
) -> Result<TranslationReport> {
    let dispatch = GenericDispatch::new(catalog, config.mapping.clone());
    let scheduler = PullScheduler::new(store, catalog, &dispatch).with_config(config);
    let roots = scheduler.root_order(store.iter());
    scheduler.run(&roots)
}

// =============================================================================
// Reverse
// =============================================================================

fn scalar_value(value: &FieldValue) -> GenericValue {
    match value {
        FieldValue::Empty | FieldValue::Reference(_) => GenericValue::Empty,
        FieldValue::Text(s) => GenericValue::Text(s.clone()),
        FieldValue::Integer(i) => GenericValue::Integer(*i),
        FieldValue::Real(r) => GenericValue::Real(*r),
    }
}

/// Scalars only; references are filled by [`link_generic`]
pub fn allocate_generic(
    record: &TargetRecord,
    handle: Handle,
) -> std::result::Result<GenericObject, MappingError> {
    let schema = record.schema();
    let mut object = GenericObject {
        handle,
        variant: record.tag().to_string(),
        name: record.name().map(str::to_string),
        values: BTreeMap::new(),
        groups: Vec::new(),
    };
    for (field, value) in schema.field_names.iter().zip(record.fixed_fields()) {
        if !value.is_empty() && value.as_reference().is_none() {
            object.values.insert(field.clone(), scalar_value(value));
        }
    }
    object.groups = record
        .groups()
        .map(|tuple| tuple.iter().map(scalar_value).collect())
        .collect();
    Ok(object)
}

/// Resolve every reference field by name
pub fn link_generic(
    record: &TargetRecord,
    object: &mut GenericObject,
    resolver: &mut LinkResolver,
) -> std::result::Result<(), MappingError> {
    let schema = record.schema();
    for (field, value) in schema.field_names.iter().zip(record.fixed_fields()) {
        if let Some(handle) = value.as_reference().and_then(|name| resolver.resolve(name)) {
            object.values.insert(field.clone(), GenericValue::Ref(handle));
        }
    }
    for (tuple, target) in record.groups().zip(object.groups.iter_mut()) {
        for (value, slot) in tuple.iter().zip(target.iter_mut()) {
            if let Some(handle) = value.as_reference().and_then(|name| resolver.resolve(name)) {
                *slot = GenericValue::Ref(handle);
            }
        }
    }
    Ok(())
}

/// Reverse rules for every tag of a catalog
pub fn generic_reverse_table(catalog: &SchemaCatalog) -> ReverseTable<GenericObject> {
    let mut table = ReverseTable::new();
    for tag in catalog.tags() {
        table.register(tag, allocate_generic, link_generic);
    }
    table
}

/// Records -> generic objects. Variants come back through the inverse of
/// `[[mapping]]`, defaulting to the record tag.
pub fn translate_generic_records(
    records: &[TargetRecord],
    catalog: &SchemaCatalog,
    config: &BridgeConfig,
) -> Result<ReverseReport<GenericObject>> {
    let table = generic_reverse_table(catalog);
    let mut report = ReverseTranslator::new(&table)
        .with_options(config.translation.clone())
        .case_insensitive(config.naming.case_insensitive)
        .translate(records)?;
    for object in report.store.iter_mut() {
        if let Some(variant) = config.mapping.variant_for(&object.variant) {
            object.variant = variant.to_string();
        }
    }
    Ok(report)
}

/// Parse record documents against a catalog
pub fn records_from_json(content: &str, catalog: &SchemaCatalog) -> Result<Vec<TargetRecord>> {
    let documents: Vec<crate::record::RecordDocument> = serde_json::from_str(content)?;
    documents
        .into_iter()
        .map(|doc| TargetRecord::from_document(doc, catalog))
        .collect::<std::result::Result<Vec<_>, BridgeError>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new()
            .with_schema(FieldSchema::new("Zone", ["Multiplier"]))
            .unwrap()
            .with_schema(FieldSchema::new("ZoneList", Vec::<String>::new()).with_extensible_group(["Zone Name"]))
            .unwrap()
    }

    #[test]
    fn test_dispatch_mapping_and_identity() {
        let catalog = catalog();
        let mapping = MappingConfig::default().with("ThermalZone", "Zone");
        let dispatch = GenericDispatch::new(&catalog, mapping);
        assert_eq!(dispatch.tag_for("ThermalZone").as_deref(), Some("Zone"));
        assert_eq!(dispatch.tag_for("ZoneList").as_deref(), Some("ZoneList"));
        assert_eq!(dispatch.tag_for("Space"), None);
    }

    #[test]
    fn test_group_references_keep_order() {
        let catalog = catalog();
        let zones: Vec<GenericObject> = ["C", "A", "B"]
            .iter()
            .map(|n| GenericObject::new("Zone").named(*n))
            .collect();
        let list = zones
            .iter()
            .fold(GenericObject::new("ZoneList").named("All"), |list, z| {
                list.with_group(vec![GenericValue::Ref(z.handle)])
            });
        let mut store = ObjectStore::new();
        let list_handle = store.insert(list).unwrap();
        for zone in zones {
            store.insert(zone).unwrap();
        }

        let report = translate_generic_model(&store, &catalog, &BridgeConfig::default()).unwrap();
        let record = report.record_for(list_handle).unwrap();
        let names: Vec<_> = record
            .groups()
            .map(|g| g[0].as_reference().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_unknown_value_field_is_invalid_record() {
        let catalog = catalog();
        let zone = GenericObject::new("Zone")
            .named("Office")
            .with_value("Azimuth", GenericValue::Real(90.0));
        let handle = zone.handle;
        let store: ObjectStore<GenericObject> = vec![zone].into_iter().collect();
        let report = translate_generic_model(&store, &catalog, &BridgeConfig::default()).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(
            report.failures_for(handle)[0].kind,
            crate::error::FailureKind::InvalidRecord
        );
    }
}
