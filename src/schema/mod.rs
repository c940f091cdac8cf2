// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Schema model: declarative field configuration, the frozen per-schema
//! registry, and entity construction/serialization.

pub mod descriptor;
pub mod entity;
pub mod fields;

pub use descriptor::{
    ConsistencyLevel, FieldHandle, SchemaBuilder, SchemaDescriptor, SchemaRef,
};
pub use entity::{Entity, EntityBuilder};
pub use fields::{FieldDescriptor, FieldKind, ScalarKind, Value, VectorElement};

use thiserror::Error;

/// Errors raised while defining schemas or constructing entities.
///
/// All of these are configuration errors: they surface at schema-definition,
/// entity-construction, or collection-creation time, never from a remote call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema `{schema}` has no attribute `{attribute}`")]
    UnknownAttribute { schema: String, attribute: String },

    #[error("unexpected attribute `{attribute}` for schema `{schema}`")]
    UnexpectedAttribute { schema: String, attribute: String },

    #[error("missing required attribute `{attribute}` for schema `{schema}`")]
    MissingAttribute { schema: String, attribute: String },

    #[error("invalid value for `{schema}.{attribute}`: expected {expected}, found {actual}")]
    TypeMismatch {
        schema: String,
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("embedding dimension mismatch for `{schema}.{attribute}`: declared {declared}, got {actual}")]
    DimensionMismatch {
        schema: String,
        attribute: String,
        declared: usize,
        actual: usize,
    },

    #[error("schema `{schema}` does not declare a primary key; add a primary key field to the definition")]
    MissingPrimaryKey { schema: String },

    #[error("schema `{schema}` declares {count} primary keys; exactly one is required")]
    MultiplePrimaryKeys { schema: String, count: usize },

    #[error("collection name must not be empty")]
    EmptyCollectionName,

    #[error("duplicate attribute `{attribute}` in schema `{schema}`")]
    DuplicateAttribute { schema: String, attribute: String },

    #[error("embedding `{schema}.{attribute}` must have a positive dimension")]
    InvalidDimension { schema: String, attribute: String },
}
