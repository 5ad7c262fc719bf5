//! Target records
//!
//! A [`TargetRecord`] is a type tag, a name, and an ordered field array laid
//! out by its [`FieldSchema`]: the fixed fields first, then any number of
//! extensible-group tuples. References to other records are carried as
//! names ([`FieldValue::Reference`]), never as pointers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::schema::{FieldSchema, SchemaSource};

/// A single field value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Real(f64),
    /// Name of another record
    Reference(String),
}

impl FieldValue {
    /// Reference to a record by name
    pub fn reference(name: impl Into<String>) -> Self {
        FieldValue::Reference(name.into())
    }

    /// Empty, or a blank string
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) | FieldValue::Reference(s) => s.trim().is_empty(),
            FieldValue::Integer(_) | FieldValue::Real(_) => false,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            FieldValue::Reference(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_real(&self) -> Option<f64> {
        match self {
            FieldValue::Real(r) => Some(*r),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(r: f64) -> Self {
        FieldValue::Real(r)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Empty)
    }
}

/// A schema-tagged record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRecord {
    tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    fields: Vec<FieldValue>,
    #[serde(skip)]
    schema: Arc<FieldSchema>,
}

impl TargetRecord {
    /// Empty record laid out by `schema`
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            tag: schema.tag.clone(),
            name: None,
            fields: vec![FieldValue::Empty; schema.field_count()],
            schema,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    /// All fields: fixed fields followed by group tuples
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Fixed fields only
    pub fn fixed_fields(&self) -> &[FieldValue] {
        &self.fields[..self.schema.field_count()]
    }

    /// Set a fixed field by name
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let index = self.schema.index_of(field).ok_or_else(|| BridgeError::UnknownField {
            tag: self.tag.clone(),
            field: field.to_string(),
        })?;
        self.fields[index] = value.into();
        Ok(())
    }

    /// Set a fixed field by index
    pub fn set_index(&mut self, index: usize, value: impl Into<FieldValue>) -> Result<()> {
        if index >= self.schema.field_count() {
            return Err(BridgeError::FieldIndex {
                tag: self.tag.clone(),
                index,
            });
        }
        self.fields[index] = value.into();
        Ok(())
    }

    /// Fixed field by name
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema.index_of(field).map(|i| &self.fields[i])
    }

    /// Any field (fixed or group) by flat index
    pub fn get_index(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    /// Extensible-group tuples in append order
    pub fn groups(&self) -> impl Iterator<Item = &[FieldValue]> {
        let arity = self.schema.extensible_group_arity().unwrap_or(1);
        self.fields[self.schema.field_count()..].chunks(arity)
    }

    pub fn group_count(&self) -> usize {
        match self.schema.extensible_group_arity() {
            Some(arity) => (self.fields.len() - self.schema.field_count()) / arity,
            None => 0,
        }
    }

    /// A named field of one group tuple
    pub fn group_value(&self, group: usize, field: &str) -> Option<&FieldValue> {
        let arity = self.schema.extensible_group_arity()?;
        let offset = self.schema.group_index_of(field)?;
        self.fields
            .get(self.schema.field_count() + group * arity + offset)
    }

    pub(crate) fn push_group(&mut self, tuple: Vec<FieldValue>) {
        self.fields.extend(tuple);
    }

    /// Every reference field as (flat index, referenced name)
    pub fn references(&self) -> impl Iterator<Item = (usize, &str)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_reference().map(|name| (i, name)))
    }

    /// Names of required fields that are empty
    pub fn missing_required(&self) -> Vec<String> {
        self.schema
            .required
            .iter()
            .filter(|&&i| self.fields.get(i).map_or(true, FieldValue::is_empty))
            .filter_map(|&i| self.schema.field_names.get(i).cloned())
            .collect()
    }

    /// Blank every reference naming `name`. Returns how many fields changed.
    pub fn clear_references_to(&mut self, name: &str, case_insensitive: bool) -> usize {
        let mut cleared = 0;
        for field in &mut self.fields {
            let hit = match field.as_reference() {
                Some(r) if case_insensitive => r.eq_ignore_ascii_case(name),
                Some(r) => r == name,
                None => false,
            };
            if hit {
                *field = FieldValue::Empty;
                cleared += 1;
            }
        }
        cleared
    }

    /// Blank a single field by flat index
    pub(crate) fn clear_index(&mut self, index: usize) {
        if let Some(field) = self.fields.get_mut(index) {
            *field = FieldValue::Empty;
        }
    }

    /// Schema-free form for external writers
    pub fn to_document(&self) -> RecordDocument {
        RecordDocument {
            tag: self.tag.clone(),
            name: self.name.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Rebuild a record from its document, re-attaching the schema.
    ///
    /// Short documents are padded with empty fields; anything past the fixed
    /// fields must form whole extensible-group tuples.
    pub fn from_document(doc: RecordDocument, schemas: &dyn SchemaSource) -> Result<Self> {
        let schema = schemas
            .schema_for(&doc.tag)
            .ok_or_else(|| BridgeError::UnknownTag(doc.tag.clone()))?;
        let fixed = schema.field_count();
        let mut fields = doc.fields;
        if fields.len() < fixed {
            fields.resize(fixed, FieldValue::Empty);
        }
        let extra = fields.len() - fixed;
        if extra > 0 {
            match schema.extensible_group_arity() {
                None => return Err(BridgeError::NotExtensible { tag: doc.tag }),
                Some(arity) if extra % arity != 0 => {
                    return Err(BridgeError::GroupArity {
                        tag: doc.tag,
                        expected: arity,
                        actual: extra % arity,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            tag: schema.tag.clone(),
            name: doc.name.filter(|n| !n.trim().is_empty()),
            fields,
            schema,
        })
    }
}

/// Record as exchanged with writers and parsers: no schema attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDocument {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}
