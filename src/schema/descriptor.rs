// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! The frozen per-schema registry and the attribute handles minted from it
//!
//! A `SchemaDescriptor` is built exactly once per schema through
//! `SchemaDescriptor::builder` and then shared immutably (`SchemaRef`) with
//! backends, entities, and query builders. Attribute access goes through
//! `schema.field(name)`, which returns a `FieldHandle` used both for
//! projection and for minting comparison expressions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::expr::{CompareOp, Condition};
use crate::schema::fields::{FieldDescriptor, FieldKind, Value};
use crate::schema::SchemaError;

/// Read-freshness knob understood by distributed backends. Absent means the
/// backend default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    Bounded,
    Session,
    Eventually,
}

impl ConsistencyLevel {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::Bounded => "Bounded",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Eventually => "Eventually",
        }
    }
}

/// Shared handle to a frozen schema definition.
pub type SchemaRef = Arc<SchemaDescriptor>;

/// A complete, validated schema: collection name, optional consistency level,
/// and the ordered attribute declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    collection_name: String,
    consistency: Option<ConsistencyLevel>,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn builder(collection_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            collection_name: collection_name.into(),
            consistency: None,
            fields: Vec::new(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn consistency(&self) -> Option<ConsistencyLevel> {
        self.consistency
    }

    /// Declared attributes in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Attribute handle for query construction. Unknown names fail with an
    /// attribute-not-found error.
    pub fn field(&self, name: &str) -> Result<FieldHandle, SchemaError> {
        if self.descriptor(name).is_none() {
            return Err(SchemaError::UnknownAttribute {
                schema: self.collection_name.clone(),
                attribute: name.to_string(),
            });
        }
        Ok(FieldHandle {
            collection: self.collection_name.clone(),
            name: name.to_string(),
        })
    }

    /// The unique primary key declaration. Zero or more than one primary key
    /// is a schema error; both backends call this before provisioning or
    /// mutating a collection.
    pub fn primary_field(&self) -> Result<&FieldDescriptor, SchemaError> {
        let primaries: Vec<&FieldDescriptor> = self
            .fields
            .iter()
            .filter(|f| f.kind.is_primary_key())
            .collect();
        match primaries.len() {
            1 => Ok(primaries[0]),
            0 => Err(SchemaError::MissingPrimaryKey {
                schema: self.collection_name.clone(),
            }),
            count => Err(SchemaError::MultiplePrimaryKeys {
                schema: self.collection_name.clone(),
                count,
            }),
        }
    }

    pub fn embedding_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind.is_embedding())
    }

    /// Default projection: every non-embedding attribute, in declaration
    /// order.
    pub fn scalar_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.kind.is_embedding())
            .map(|f| f.name.clone())
            .collect()
    }
}

/// One-shot builder for `SchemaDescriptor`.
pub struct SchemaBuilder {
    collection_name: String,
    consistency: Option<ConsistencyLevel>,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Freeze the schema. Validates the collection name, attribute-name
    /// uniqueness, and embedding dimensions. Primary-key cardinality is
    /// deferred to collection creation and insert time.
    pub fn build(self) -> Result<SchemaRef, SchemaError> {
        if self.collection_name.is_empty() {
            return Err(SchemaError::EmptyCollectionName);
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateAttribute {
                    schema: self.collection_name.clone(),
                    attribute: field.name.clone(),
                });
            }
            if let FieldKind::Embedding { dim, .. } = &field.kind {
                if *dim == 0 {
                    return Err(SchemaError::InvalidDimension {
                        schema: self.collection_name.clone(),
                        attribute: field.name.clone(),
                    });
                }
            }
        }

        Ok(Arc::new(SchemaDescriptor {
            collection_name: self.collection_name,
            consistency: self.consistency,
            fields: self.fields,
        }))
    }
}

/// A schema-bound attribute handle.
///
/// Comparison methods mint deferred `Condition` values consumed by the query
/// builder; the handle itself also serves as a projection target and as the
/// similarity-ordering target.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    collection: String,
    name: String,
}

impl FieldHandle {
    /// Collection of the schema that minted this handle.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, op: CompareOp, value: impl Into<Value>) -> Condition {
        Condition {
            collection: self.collection.clone(),
            field: self.name.clone(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Le, value)
    }
}
