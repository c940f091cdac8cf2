// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Backend contract and shared translation helpers
//!
//! Every supported vector database implements [`VectorBackend`]. Backends
//! receive schemas and flattened search requests, never the query builder,
//! and talk to their remote service through an opaque client trait supplied
//! at construction time.

pub mod milvus;
pub mod pinecone;

pub use milvus::MilvusBackend;
pub use pinecone::PineconeBackend;

use async_trait::async_trait;

use thiserror::Error;

use crate::query::expr::Condition;
use crate::results::QueryResult;
use crate::schema::fields::{FieldKind, Value, VectorElement};
use crate::schema::{Entity, SchemaError, SchemaRef};
use crate::indexes::MetricFamily;

/// Failure reported by a remote client. The core never retries, wraps, or
/// suppresses these; they pass through to the caller untouched.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by backend adapters before or while talking to the remote
/// service.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("entity for `{collection}` has no primary key value")]
    MissingPrimaryKeyValue { collection: String },

    #[error("offset is not supported by the {backend} backend")]
    OffsetUnsupported { backend: &'static str },

    #[error("limit {limit} with offset {offset} exceeds the {backend} maximum fetch size of {max}")]
    FetchTooLarge {
        backend: &'static str,
        limit: usize,
        offset: usize,
        max: usize,
    },

    #[error("embedding dimension {dim} for `{collection}.{field}` exceeds the {backend} maximum of {max}")]
    DimensionTooLarge {
        backend: &'static str,
        collection: String,
        field: String,
        dim: usize,
        max: usize,
    },

    #[error("index type {index_type} is not compatible with {element} vectors on `{collection}.{field}`")]
    IncompatibleIndex {
        collection: String,
        field: String,
        index_type: &'static str,
        element: &'static str,
    },

    #[error("the {backend} backend does not support `{index_type}` indexes")]
    UnsupportedIndex {
        backend: &'static str,
        index_type: String,
    },

    #[error("the {backend} backend does not support binary embeddings")]
    BinaryEmbeddingsUnsupported { backend: &'static str },

    #[error("`{collection}` has {count} embedding fields; the {backend} backend requires exactly one")]
    EmbeddingCountInvalid {
        backend: &'static str,
        collection: String,
        count: usize,
    },

    #[error("inserted entities do not align for collection `{collection}`: attribute `{field}` has {actual} values for {expected} entities")]
    BatchMisaligned {
        collection: String,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("the {backend} backend does not support batch progress logging; insertion happens in one operation")]
    ProgressUnsupported { backend: &'static str },

    #[error("invalid collection name `{name}`; must be lowercase, alphanumeric, and hyphenated")]
    InvalidCollectionName { name: String },

    #[error("entity for `{collection}` has no value for embedding `{field}`")]
    MissingEmbeddingValue { collection: String, field: String },

    #[error("cannot filter on `{field}`: {kind} values are not comparable")]
    UnsupportedFilterValue { field: String, kind: &'static str },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Similarity target of a search: which embedding attribute to rank by and
/// the query vector, still element-typed.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityTarget {
    pub field: String,
    pub vector: Value,
}

/// The flattened query state handed to a backend: projection, conjunctive
/// filters, optional similarity target, and resolved limit/offset.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub output_fields: Vec<String>,
    pub filters: Vec<Condition>,
    pub similarity: Option<SimilarityTarget>,
    pub limit: usize,
    pub offset: usize,
}

/// Uniform operation set over the supported vector databases.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Hard cap on how many rows one search may fetch.
    fn max_fetch_size(&self) -> usize;

    /// Provision backend-side storage for the schema, including one index
    /// per embedding attribute. Validates primary-key cardinality and
    /// embedding/index compatibility before any remote call.
    async fn create_collection(&self, schema: &SchemaRef) -> Result<(), BackendError>;

    /// Remove all rows. Idempotent: clearing a collection that does not
    /// exist is not an error.
    async fn clear_collection(&self, schema: &SchemaRef) -> Result<(), BackendError>;

    /// Drop the collection. Idempotent for backends that can check
    /// existence.
    async fn delete_collection(&self, schema: &SchemaRef) -> Result<(), BackendError>;

    /// Insert one entity; returns the backend-assigned primary key.
    async fn insert(&self, entity: &Entity) -> Result<i64, BackendError>;

    /// Insert a batch, possibly mixing schemas. Returns primary keys aligned
    /// with the input order.
    async fn insert_batch(
        &self,
        entities: &[Entity],
        show_progress: bool,
    ) -> Result<Vec<i64>, BackendError>;

    /// Delete by primary key; the entity must have been inserted.
    async fn delete(&self, entity: &Entity) -> Result<(), BackendError>;

    /// Execute a similarity search or a scalar query, depending on whether
    /// the request carries a similarity target.
    async fn search(
        &self,
        schema: &SchemaRef,
        request: SearchRequest,
    ) -> Result<Vec<QueryResult>, BackendError>;

    /// Durability barrier; a no-op for backends without local buffering.
    async fn flush(&self, schema: &SchemaRef) -> Result<(), BackendError>;

    /// Availability barrier; a no-op for backends without a load step.
    async fn load(&self, schema: &SchemaRef) -> Result<(), BackendError>;
}

/// Pack a boolean vector into a bit-dense byte buffer, eight values per
/// byte, most significant bit first. Required wire format for binary
/// embeddings.
pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; (bits.len() + 7) / 8];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    packed
}

/// Group batch entities by collection, keeping the original index of every
/// entity so assigned keys can be remapped to input order. Groups preserve
/// first-seen order.
pub(crate) fn group_by_collection(entities: &[Entity]) -> Vec<(SchemaRef, Vec<usize>)> {
    let mut groups: Vec<(SchemaRef, Vec<usize>)> = Vec::new();
    for (i, entity) in entities.iter().enumerate() {
        let name = entity.schema().collection_name();
        match groups
            .iter_mut()
            .find(|(schema, _)| schema.collection_name() == name)
        {
            Some((_, indices)) => indices.push(i),
            None => groups.push((SchemaRef::clone(entity.schema()), vec![i])),
        }
    }
    groups
}

/// Scatter per-group keys back to the original batch order.
pub(crate) fn remap_group_keys(
    total: usize,
    groups: &[(SchemaRef, Vec<usize>)],
    keys_per_group: Vec<Vec<i64>>,
) -> Vec<i64> {
    let mut ordered = vec![0i64; total];
    for ((_, indices), keys) in groups.iter().zip(keys_per_group) {
        for (index, key) in indices.iter().zip(keys) {
            ordered[*index] = key;
        }
    }
    ordered
}

/// Reject a fetch window that exceeds the backend cap before any remote
/// call is made.
pub(crate) fn check_fetch_window(
    backend: &'static str,
    max: usize,
    limit: usize,
    offset: usize,
) -> Result<(), BackendError> {
    if limit + offset > max {
        return Err(BackendError::FetchTooLarge {
            backend,
            limit,
            offset,
            max,
        });
    }
    Ok(())
}

/// Check that an embedding's index family agrees with its element type.
pub(crate) fn check_index_element(
    collection: &str,
    field: &str,
    kind: &FieldKind,
) -> Result<(), BackendError> {
    if let FieldKind::Embedding { element, index, .. } = kind {
        let expected = match element {
            VectorElement::Float32 => MetricFamily::Floating,
            VectorElement::Binary => MetricFamily::Binary,
        };
        if index.metric_family() != expected {
            return Err(BackendError::IncompatibleIndex {
                collection: collection.to_string(),
                field: field.to_string(),
                index_type: index.index_type(),
                element: element.type_name(),
            });
        }
    }
    Ok(())
}
