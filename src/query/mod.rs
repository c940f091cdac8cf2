// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Chainable query construction
//!
//! A `Query` accumulates filters, projection, similarity ordering, and
//! limit/offset without touching the backend. The terminal `all()` call
//! validates the accumulated state, flattens it into a `SearchRequest`, and
//! dispatches exactly one backend `search` call. `all()` consumes the
//! builder, so a finished query cannot be extended or re-run.

pub mod expr;

use std::sync::Arc;

use thiserror::Error;

use crate::backends::{BackendError, SearchRequest, SimilarityTarget, VectorBackend};
use crate::query::expr::Condition;
use crate::results::QueryResult;
use crate::schema::fields::{FieldKind, Value, VectorElement};
use crate::schema::{FieldHandle, SchemaError, SchemaRef};

/// Errors raised while assembling or evaluating a query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("only one similarity ordering can be used per query")]
    DuplicateSimilarity,

    #[error("embedding `{field}` cannot be projected directly; rank by it with order_by_similarity instead")]
    EmbeddingProjection { field: String },

    #[error("similarity ordering requires an embedding attribute; `{field}` is {kind}")]
    SimilarityTargetNotEmbedding { field: String, kind: String },

    #[error("query vector for `{field}` must be a {expected} vector, got {actual}")]
    SimilarityVectorMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("`{field}` does not belong to collection `{collection}`")]
    ForeignField { field: String, collection: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Accumulating query builder bound to one schema and one backend.
pub struct Query {
    backend: Arc<dyn VectorBackend>,
    schema: SchemaRef,
    projections: Vec<FieldHandle>,
    filters: Vec<Condition>,
    limit: Option<usize>,
    offset: Option<usize>,
    similarity: Option<(FieldHandle, Value)>,
    duplicate_similarity: bool,
}

impl Query {
    pub(crate) fn new(backend: Arc<dyn VectorBackend>, schema: SchemaRef) -> Self {
        Self {
            backend,
            schema,
            projections: Vec::new(),
            filters: Vec::new(),
            limit: None,
            offset: None,
            similarity: None,
            duplicate_similarity: false,
        }
    }

    /// Restrict the output fields to the given attributes. Without a
    /// `select`, every non-embedding attribute is returned.
    pub fn select(mut self, fields: impl IntoIterator<Item = FieldHandle>) -> Self {
        self.projections.extend(fields);
        self
    }

    /// Append comparisons to the filter set. Filters combine conjunctively;
    /// repeated calls keep appending.
    pub fn filter(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.filters.extend(conditions);
        self
    }

    /// Cap the number of results. Overwrites any previous limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` results. Overwrites any previous offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Rank results by similarity of `field` to `query_vector`. A query
    /// supports at most one similarity ordering; a second call is reported
    /// as an error at evaluation time.
    pub fn order_by_similarity(
        mut self,
        field: &FieldHandle,
        query_vector: impl Into<Value>,
    ) -> Self {
        if self.similarity.is_some() {
            self.duplicate_similarity = true;
        } else {
            self.similarity = Some((field.clone(), query_vector.into()));
        }
        self
    }

    /// Evaluate the query against the backend.
    pub async fn all(self) -> Result<Vec<QueryResult>, QueryError> {
        if self.duplicate_similarity {
            return Err(QueryError::DuplicateSimilarity);
        }

        let collection = self.schema.collection_name();

        for condition in &self.filters {
            if condition.collection != collection
                || self.schema.descriptor(&condition.field).is_none()
            {
                return Err(QueryError::ForeignField {
                    field: condition.field.clone(),
                    collection: collection.to_string(),
                });
            }
        }

        let similarity = match &self.similarity {
            Some((handle, query_vector)) => {
                Some(self.check_similarity(handle, query_vector)?)
            }
            None => None,
        };

        let output_fields = self.output_fields()?;

        let offset = self.offset.unwrap_or(0);
        let limit = self
            .limit
            .unwrap_or_else(|| self.backend.max_fetch_size().saturating_sub(offset));

        let request = SearchRequest {
            output_fields,
            filters: self.filters.clone(),
            similarity,
            limit,
            offset,
        };

        Ok(self.backend.search(&self.schema, request).await?)
    }

    fn check_similarity(
        &self,
        handle: &FieldHandle,
        query_vector: &Value,
    ) -> Result<SimilarityTarget, QueryError> {
        let collection = self.schema.collection_name();
        if handle.collection() != collection {
            return Err(QueryError::ForeignField {
                field: handle.name().to_string(),
                collection: collection.to_string(),
            });
        }

        let descriptor = self
            .schema
            .descriptor(handle.name())
            .ok_or_else(|| QueryError::ForeignField {
                field: handle.name().to_string(),
                collection: collection.to_string(),
            })?;

        let element = match &descriptor.kind {
            FieldKind::Embedding { element, .. } => *element,
            other => {
                return Err(QueryError::SimilarityTargetNotEmbedding {
                    field: handle.name().to_string(),
                    kind: other.type_name(),
                })
            }
        };

        let matches = match element {
            VectorElement::Float32 => matches!(query_vector, Value::FloatVector(_)),
            VectorElement::Binary => matches!(query_vector, Value::BinaryVector(_)),
        };
        if !matches {
            return Err(QueryError::SimilarityVectorMismatch {
                field: handle.name().to_string(),
                expected: element.type_name(),
                actual: query_vector.type_name(),
            });
        }

        Ok(SimilarityTarget {
            field: handle.name().to_string(),
            vector: query_vector.clone(),
        })
    }

    /// Output fields default to every non-embedding attribute; explicit
    /// projections are validated instead. Projecting an embedding outside
    /// `order_by_similarity` is an error.
    fn output_fields(&self) -> Result<Vec<String>, QueryError> {
        if self.projections.is_empty() {
            return Ok(self.schema.scalar_field_names());
        }

        let collection = self.schema.collection_name();
        let mut fields = Vec::with_capacity(self.projections.len());
        for handle in &self.projections {
            if handle.collection() != collection {
                return Err(QueryError::ForeignField {
                    field: handle.name().to_string(),
                    collection: collection.to_string(),
                });
            }
            let descriptor = self
                .schema
                .descriptor(handle.name())
                .ok_or_else(|| QueryError::ForeignField {
                    field: handle.name().to_string(),
                    collection: collection.to_string(),
                })?;
            if descriptor.kind.is_embedding() {
                return Err(QueryError::EmbeddingProjection {
                    field: handle.name().to_string(),
                });
            }
            fields.push(handle.name().to_string());
        }
        Ok(fields)
    }
}
