use crate::geometry::Geometry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 0-based position of a record within the geometry file.
pub type RecordId = u32;

/// Semantic type of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Numeric,
    Text,
    Timestamp,
    Boolean,
}

/// One column of the attribute table, fixed for the lifetime of an open file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Field name, at most 10 characters in the attribute file
    pub name: String,
    pub field_type: FieldType,
    /// Raw type code from the descriptor table (`C`, `N`, `F`, `L`, `D`, ...)
    pub type_code: char,
    /// Width in bytes within a row
    pub width: u8,
    /// Decimal count for numeric fields
    pub precision: u8,
}

impl FieldDeclaration {
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        type_code: char,
        width: u8,
        precision: u8,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            type_code,
            width,
            precision,
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// The implicit geometry property every feature type carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryField {
    pub name: String,
}

impl Default for GeometryField {
    fn default() -> Self {
        Self {
            name: "geometry".to_string(),
        }
    }
}

/// Ordered attribute fields plus exactly one geometry field.
///
/// Derived once when a store opens: from the attribute file header, or
/// geometry-only when there is no usable attribute file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTypeDescriptor {
    name: String,
    fields: Vec<Arc<FieldDeclaration>>,
    geometry: GeometryField,
}

impl FeatureTypeDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<Arc<FieldDeclaration>>) -> Self {
        Self {
            name: name.into(),
            fields,
            geometry: GeometryField::default(),
        }
    }

    /// A descriptor exposing only the geometry field.
    pub fn geometry_only(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Arc<FieldDeclaration>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldDeclaration>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn geometry_field(&self) -> &GeometryField {
        &self.geometry
    }

    /// Attribute fields plus the geometry field.
    pub fn property_count(&self) -> usize {
        self.fields.len() + 1
    }
}

/// One assembled feature, created per query and handed to callers by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: RecordId,
    pub geometry: Option<Geometry>,
    /// Values in descriptor field order; empty when the row is absent or deleted
    pub attributes: Vec<(Arc<FieldDeclaration>, Value)>,
}

impl FeatureRecord {
    pub fn new(
        id: RecordId,
        geometry: Option<Geometry>,
        attributes: Vec<(Arc<FieldDeclaration>, Value)>,
    ) -> Self {
        Self {
            id,
            geometry,
            attributes,
        }
    }

    /// Value of the named attribute, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(field, _)| field.name == name)
            .map(|(_, value)| value)
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Identifier in the form features are published under (`shp_<id>`).
    pub fn feature_id(&self) -> String {
        format!("shp_{}", self.id)
    }
}
