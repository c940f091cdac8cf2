// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Field descriptors and the value model shared by every backend
//!
//! Each schema attribute is declared with an explicit, closed `FieldKind` tag
//! instead of being inferred from runtime types. Values crossing the
//! entity/backend seam are carried by the `Value` enum.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::indexes::VectorIndex;
use crate::schema::SchemaError;

/// Scalar storage types available for plain (non-vector, non-text) attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Int64,
    Float64,
    Bool,
}

impl ScalarKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Int64 => "Int64",
            ScalarKind::Float64 => "Float64",
            ScalarKind::Bool => "Bool",
        }
    }
}

/// Element type of an embedding vector.
///
/// Floating vectors serialize as plain numeric lists; binary vectors are
/// bit-packed into byte buffers before transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorElement {
    Float32,
    Binary,
}

impl VectorElement {
    pub fn type_name(&self) -> &'static str {
        match self {
            VectorElement::Float32 => "FloatVector",
            VectorElement::Binary => "BinaryVector",
        }
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    FloatVector(Vec<f32>),
    BinaryVector(Vec<bool>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Int(_) => "Int64",
            Value::Float(_) => "Float64",
            Value::Bool(_) => "Bool",
            Value::Text(_) => "Text",
            Value::FloatVector(_) => "FloatVector",
            Value::BinaryVector(_) => "BinaryVector",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_vector(&self) -> Option<&[f32]> {
        match self {
            Value::FloatVector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_binary_vector(&self) -> Option<&[bool]> {
        match self {
            Value::BinaryVector(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to the JSON representation used on the client seam.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Int(v) => JsonValue::from(*v),
            Value::Float(v) => JsonValue::from(*v),
            Value::Bool(v) => JsonValue::from(*v),
            Value::Text(v) => JsonValue::from(v.clone()),
            Value::FloatVector(v) => JsonValue::from(v.clone()),
            Value::BinaryVector(v) => JsonValue::from(v.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatVector(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BinaryVector(v)
    }
}

/// Storage kind of a declared attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Backend-assigned 64-bit unique identifier; nullable before insert.
    PrimaryKey,

    /// Bounded text; `max_length` is enforced by the backend at collection
    /// creation time, not by this layer.
    VarChar { max_length: usize },

    /// Fixed-dimension vector attribute with an associated index.
    Embedding {
        dim: usize,
        element: VectorElement,
        index: VectorIndex,
    },

    /// Plain scalar storage.
    Scalar(ScalarKind),
}

impl FieldKind {
    pub fn is_embedding(&self) -> bool {
        matches!(self, FieldKind::Embedding { .. })
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self, FieldKind::PrimaryKey)
    }

    pub fn type_name(&self) -> String {
        match self {
            FieldKind::PrimaryKey => "Int64".to_string(),
            FieldKind::VarChar { .. } => "Text".to_string(),
            FieldKind::Embedding { element, .. } => element.type_name().to_string(),
            FieldKind::Scalar(kind) => kind.type_name().to_string(),
        }
    }

    /// Validate a value against this kind. Null is accepted for every kind.
    pub fn check(&self, schema: &str, field: &str, value: &Value) -> Result<(), SchemaError> {
        if value.is_null() {
            return Ok(());
        }

        let ok = match self {
            FieldKind::PrimaryKey => matches!(value, Value::Int(_)),
            FieldKind::VarChar { .. } => matches!(value, Value::Text(_)),
            FieldKind::Embedding {
                element: VectorElement::Float32,
                ..
            } => matches!(value, Value::FloatVector(_)),
            FieldKind::Embedding {
                element: VectorElement::Binary,
                ..
            } => matches!(value, Value::BinaryVector(_)),
            FieldKind::Scalar(ScalarKind::Int64) => matches!(value, Value::Int(_)),
            FieldKind::Scalar(ScalarKind::Float64) => matches!(value, Value::Float(_)),
            FieldKind::Scalar(ScalarKind::Bool) => matches!(value, Value::Bool(_)),
        };

        if !ok {
            return Err(SchemaError::TypeMismatch {
                schema: schema.to_string(),
                attribute: field.to_string(),
                expected: self.type_name(),
                actual: value.type_name().to_string(),
            });
        }

        if let FieldKind::Embedding { dim, .. } = self {
            let actual = match value {
                Value::FloatVector(v) => v.len(),
                Value::BinaryVector(v) => v.len(),
                _ => unreachable!(),
            };
            if actual != *dim {
                return Err(SchemaError::DimensionMismatch {
                    schema: schema.to_string(),
                    attribute: field.to_string(),
                    declared: *dim,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Decode a JSON value returned by a remote client into a typed `Value`,
    /// directed by the declared kind.
    pub fn decode_json(
        &self,
        schema: &str,
        field: &str,
        value: &JsonValue,
    ) -> Result<Value, SchemaError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let mismatch = || SchemaError::TypeMismatch {
            schema: schema.to_string(),
            attribute: field.to_string(),
            expected: self.type_name(),
            actual: json_type_name(value).to_string(),
        };

        match self {
            FieldKind::PrimaryKey | FieldKind::Scalar(ScalarKind::Int64) => {
                value.as_i64().map(Value::Int).ok_or_else(mismatch)
            }
            FieldKind::Scalar(ScalarKind::Float64) => {
                value.as_f64().map(Value::Float).ok_or_else(mismatch)
            }
            FieldKind::Scalar(ScalarKind::Bool) => {
                value.as_bool().map(Value::Bool).ok_or_else(mismatch)
            }
            FieldKind::VarChar { .. } => value
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(mismatch),
            FieldKind::Embedding {
                element: VectorElement::Float32,
                ..
            } => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let mut data = Vec::with_capacity(items.len());
                for item in items {
                    data.push(item.as_f64().ok_or_else(mismatch)? as f32);
                }
                Ok(Value::FloatVector(data))
            }
            FieldKind::Embedding {
                element: VectorElement::Binary,
                ..
            } => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let mut data = Vec::with_capacity(items.len());
                for item in items {
                    data.push(item.as_bool().ok_or_else(mismatch)?);
                }
                Ok(Value::BinaryVector(data))
            }
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "Null",
        JsonValue::Bool(_) => "Bool",
        JsonValue::Number(_) => "Number",
        JsonValue::String(_) => "String",
        JsonValue::Array(_) => "Array",
        JsonValue::Object(_) => "Object",
    }
}

/// Declaration of one schema attribute: a name, a storage kind, and an
/// optional construction default.
///
/// A `None` default marks the attribute as required at entity construction.
/// The descriptor constructors default to `Some(Value::Null)` so that
/// configured attributes are nullable before insert, mirroring how primary
/// keys and embeddings start out unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub default: Option<Value>,
}

impl FieldDescriptor {
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::PrimaryKey,
            default: Some(Value::Null),
        }
    }

    pub fn varchar(name: impl Into<String>, max_length: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::VarChar { max_length },
            default: Some(Value::Null),
        }
    }

    pub fn float_embedding(
        name: impl Into<String>,
        dim: usize,
        index: impl Into<VectorIndex>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Embedding {
                dim,
                element: VectorElement::Float32,
                index: index.into(),
            },
            default: Some(Value::Null),
        }
    }

    pub fn binary_embedding(
        name: impl Into<String>,
        dim: usize,
        index: impl Into<VectorIndex>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Embedding {
                dim,
                element: VectorElement::Binary,
                index: index.into(),
            },
            default: Some(Value::Null),
        }
    }

    /// A plain scalar attribute with no default: a value must be supplied at
    /// construction time.
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(kind),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}
