// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Entity construction and serialization against a frozen schema.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::schema::descriptor::SchemaRef;
use crate::schema::fields::Value;
use crate::schema::SchemaError;

/// One row of a collection: a schema reference plus a value for every
/// declared attribute.
///
/// Entities are built through [`EntityBuilder`], which mirrors keyword-only
/// construction: unknown attributes are rejected, omitted attributes take
/// their descriptor default, and an attribute with neither a value nor a
/// default is a construction error.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    schema: SchemaRef,
    values: BTreeMap<String, Value>,
}

impl Entity {
    pub fn builder(schema: &SchemaRef) -> EntityBuilder {
        EntityBuilder {
            schema: SchemaRef::clone(schema),
            values: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Result<&Value, SchemaError> {
        self.values
            .get(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                schema: self.schema.collection_name().to_string(),
                attribute: name.to_string(),
            })
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), SchemaError> {
        let descriptor =
            self.schema
                .descriptor(name)
                .ok_or_else(|| SchemaError::UnknownAttribute {
                    schema: self.schema.collection_name().to_string(),
                    attribute: name.to_string(),
                })?;
        let value = value.into();
        descriptor
            .kind
            .check(self.schema.collection_name(), name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Attribute values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        static NULL: Value = Value::Null;
        self.schema.fields().iter().map(|field| {
            let value = self.values.get(&field.name).unwrap_or(&NULL);
            (field.name.as_str(), value)
        })
    }

    /// The primary key value, if assigned. Errors when the schema does not
    /// declare exactly one primary key.
    pub fn primary_key(&self) -> Result<Option<i64>, SchemaError> {
        let primary = self.schema.primary_field()?;
        Ok(self.get(&primary.name)?.as_int())
    }

    /// Assign or clear the backend-provided primary key.
    pub fn set_primary_key(&mut self, key: Option<i64>) -> Result<(), SchemaError> {
        let name = self.schema.primary_field()?.name.clone();
        let value = match key {
            Some(k) => Value::Int(k),
            None => Value::Null,
        };
        self.values.insert(name, value);
        Ok(())
    }

    /// Construct an entity from an attribute/value mapping, rejecting keys
    /// outside the declared attribute set.
    pub fn from_record(
        schema: &SchemaRef,
        record: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, SchemaError> {
        let mut builder = Entity::builder(schema);
        for (name, value) in record {
            builder = builder.set(name, value);
        }
        builder.build()
    }

    /// Construct an entity from a JSON row returned by a remote client,
    /// decoding each value according to its declared kind.
    pub fn from_json_record(
        schema: &SchemaRef,
        record: &serde_json::Map<String, JsonValue>,
    ) -> Result<Self, SchemaError> {
        let collection = schema.collection_name();
        let mut builder = Entity::builder(schema);
        for (name, raw) in record {
            let descriptor =
                schema
                    .descriptor(name)
                    .ok_or_else(|| SchemaError::UnexpectedAttribute {
                        schema: collection.to_string(),
                        attribute: name.clone(),
                    })?;
            let value = descriptor.kind.decode_json(collection, name, raw)?;
            builder = builder.set(name.clone(), value);
        }
        builder.build()
    }
}

/// Keyword-style entity builder.
pub struct EntityBuilder {
    schema: SchemaRef,
    values: BTreeMap<String, Value>,
}

impl EntityBuilder {
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Validate the accumulated attributes and produce the entity.
    pub fn build(self) -> Result<Entity, SchemaError> {
        let collection = self.schema.collection_name();

        for (name, value) in &self.values {
            let descriptor =
                self.schema
                    .descriptor(name)
                    .ok_or_else(|| SchemaError::UnexpectedAttribute {
                        schema: collection.to_string(),
                        attribute: name.clone(),
                    })?;
            descriptor.kind.check(collection, name, value)?;
        }

        let mut values = self.values;
        for field in self.schema.fields() {
            if values.contains_key(&field.name) {
                continue;
            }
            match &field.default {
                Some(default) => {
                    values.insert(field.name.clone(), default.clone());
                }
                None => {
                    return Err(SchemaError::MissingAttribute {
                        schema: collection.to_string(),
                        attribute: field.name.clone(),
                    });
                }
            }
        }

        Ok(Entity {
            schema: self.schema,
            values,
        })
    }
}
