// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pinecone backend adapter
//!
//! Pinecone stores exactly one float vector per row; scalar attributes ride
//! along as metadata and filters use Mongo-style operator maps. Primary keys
//! are minted locally from v4 UUIDs because the service has no auto-id.

pub mod client;

pub use client::{
    PineconeApi, PineconeIndexSpec, PineconeMatch, PineconeQueryRequest, PineconeVector,
};

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use crate::backends::{
    group_by_collection, remap_group_keys, BackendError, SearchRequest, VectorBackend,
};
use crate::indexes::VectorIndex;
use crate::query::expr::{CompareOp, Condition};
use crate::results::QueryResult;
use crate::schema::fields::{FieldDescriptor, FieldKind, Value, VectorElement};
use crate::schema::{Entity, SchemaError, SchemaRef};

/// Metadata is only returned for fetches of at most this many rows.
pub const MAX_FETCH_SIZE: usize = 1000;

pub struct PineconeBackend {
    api: Arc<dyn PineconeApi>,
}

impl PineconeBackend {
    pub fn new(api: Arc<dyn PineconeApi>) -> Self {
        Self { api }
    }

    /// Pinecone index names cannot contain underscores; collection names are
    /// transformed and then validated.
    fn index_name(schema: &SchemaRef) -> Result<String, BackendError> {
        let name = schema.collection_name().replace('_', "-");
        static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = NAME_PATTERN
            .get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid pattern"));
        if !pattern.is_match(&name) {
            return Err(BackendError::InvalidCollectionName { name });
        }
        Ok(name)
    }

    /// The single embedding field this backend supports per collection. Also
    /// checks that it carries a Pinecone index over float elements.
    fn embedding_field(schema: &SchemaRef) -> Result<&FieldDescriptor, BackendError> {
        let embeddings: Vec<&FieldDescriptor> = schema.embedding_fields().collect();
        if embeddings.len() != 1 {
            return Err(BackendError::EmbeddingCountInvalid {
                backend: "Pinecone",
                collection: schema.collection_name().to_string(),
                count: embeddings.len(),
            });
        }

        let field = embeddings[0];
        let FieldKind::Embedding { element, index, .. } = &field.kind else {
            unreachable!("embedding_fields only yields embeddings");
        };
        if *element == VectorElement::Binary {
            return Err(BackendError::BinaryEmbeddingsUnsupported {
                backend: "Pinecone",
            });
        }
        if !matches!(index, VectorIndex::Pinecone(_)) {
            return Err(BackendError::UnsupportedIndex {
                backend: "Pinecone",
                index_type: index.index_type().to_string(),
            });
        }
        Ok(field)
    }

    fn embedding_dim(field: &FieldDescriptor) -> usize {
        match &field.kind {
            FieldKind::Embedding { dim, .. } => *dim,
            _ => 0,
        }
    }

    /// Derive a 64-bit primary key the way the service cannot: locally,
    /// from a v4 UUID.
    fn mint_key() -> i64 {
        (Uuid::new_v4().as_u128() & (i64::MAX as u128)) as i64
    }

    /// Upsert payload for one entity under an already-minted key.
    fn vector_payload(
        entity: &Entity,
        embedding: &FieldDescriptor,
        primary: &str,
        key: i64,
    ) -> Result<PineconeVector, BackendError> {
        let schema = entity.schema();
        let collection = schema.collection_name();

        let value = entity.get(&embedding.name)?;
        let Value::FloatVector(values) = value else {
            return Err(BackendError::MissingEmbeddingValue {
                collection: collection.to_string(),
                field: embedding.name.clone(),
            });
        };
        embedding.kind.check(collection, &embedding.name, value)?;

        let mut metadata = JsonMap::new();
        for (name, value) in entity.values() {
            if name == embedding.name || name == primary || value.is_null() {
                continue;
            }
            metadata.insert(name.to_string(), value.to_json());
        }
        metadata.insert(primary.to_string(), json!(key));

        Ok(PineconeVector {
            id: key.to_string(),
            values: values.clone(),
            metadata: JsonValue::Object(metadata),
        })
    }

    /// Mongo-style filter map; conditions on the same attribute merge into
    /// one operator object, which keeps the conjunction semantics.
    fn filter_payload(filters: &[Condition]) -> Result<Option<JsonValue>, BackendError> {
        if filters.is_empty() {
            return Ok(None);
        }

        let mut payload = JsonMap::new();
        for condition in filters {
            let operator = match condition.op {
                CompareOp::Eq => "$eq",
                CompareOp::Ne => "$ne",
                CompareOp::Gt => "$gt",
                CompareOp::Ge => "$gte",
                CompareOp::Lt => "$lt",
                CompareOp::Le => "$lte",
            };
            let value = match &condition.value {
                Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Text(_) => {
                    condition.value.to_json()
                }
                other => {
                    return Err(BackendError::UnsupportedFilterValue {
                        field: condition.field.clone(),
                        kind: other.type_name(),
                    })
                }
            };

            let entry = payload
                .entry(condition.field.clone())
                .or_insert_with(|| JsonValue::Object(JsonMap::new()));
            if let JsonValue::Object(ops) = entry {
                ops.insert(operator.to_string(), value);
            }
        }
        Ok(Some(JsonValue::Object(payload)))
    }

    fn result_from_match(
        schema: &SchemaRef,
        output_fields: &[String],
        primary: &str,
        item: PineconeMatch,
        scored: bool,
    ) -> Result<QueryResult, BackendError> {
        let collection = schema.collection_name();

        let mut record = JsonMap::new();
        if let JsonValue::Object(metadata) = item.metadata {
            for (name, value) in metadata {
                if output_fields.iter().any(|f| f == &name) {
                    record.insert(name, value);
                }
            }
        }

        let mut entity = Entity::from_json_record(schema, &record)?;
        let key = item
            .id
            .parse::<i64>()
            .map_err(|_| SchemaError::TypeMismatch {
                schema: collection.to_string(),
                attribute: primary.to_string(),
                expected: "Int64".to_string(),
                actual: format!("id `{}`", item.id),
            })?;
        entity.set_primary_key(Some(key))?;

        Ok(if scored {
            QueryResult {
                entity,
                score: Some(item.score),
                distance: None,
            }
        } else {
            QueryResult::new(entity)
        })
    }
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn max_fetch_size(&self) -> usize {
        MAX_FETCH_SIZE
    }

    async fn create_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        let name = Self::index_name(schema)?;

        if self.api.list_indexes().await?.contains(&name) {
            info!(collection = %name, "collection already created");
            return Ok(());
        }

        schema.primary_field()?;
        let embedding = Self::embedding_field(schema)?;
        let metric = match &embedding.kind {
            FieldKind::Embedding {
                index: VectorIndex::Pinecone(index),
                ..
            } => index.metric().wire_name().to_string(),
            _ => unreachable!("embedding_field enforces a Pinecone index"),
        };

        // Every attribute is registered for metadata search. This costs
        // memory; a selective-indexing flag can narrow it later if needed.
        let indexed_fields = schema
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();

        info!(collection = %name, "creating collection, this can take 30s-5min");
        self.api
            .create_index(PineconeIndexSpec {
                name,
                dimension: Self::embedding_dim(embedding),
                metric,
                indexed_fields,
            })
            .await?;
        Ok(())
    }

    async fn clear_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        let name = Self::index_name(schema)?;
        if !self.api.list_indexes().await?.contains(&name) {
            return Ok(());
        }
        self.api.delete_all(&name).await?;
        Ok(())
    }

    async fn delete_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        let name = Self::index_name(schema)?;
        // The service answers a plain 404 for unknown indexes; skip instead.
        if !self.api.list_indexes().await?.contains(&name) {
            return Ok(());
        }
        self.api.delete_index(&name).await?;
        Ok(())
    }

    async fn insert(&self, entity: &Entity) -> Result<i64, BackendError> {
        let schema = entity.schema();
        let name = Self::index_name(schema)?;
        let primary = schema.primary_field()?.name.clone();
        let embedding = Self::embedding_field(schema)?;

        let key = Self::mint_key();
        let payload = Self::vector_payload(entity, embedding, &primary, key)?;
        self.api.upsert(&name, vec![payload]).await?;
        Ok(key)
    }

    async fn insert_batch(
        &self,
        entities: &[Entity],
        show_progress: bool,
    ) -> Result<Vec<i64>, BackendError> {
        let groups = group_by_collection(entities);
        let mut keys_per_group = Vec::with_capacity(groups.len());

        for (group_index, (schema, indices)) in groups.iter().enumerate() {
            let name = Self::index_name(schema)?;
            let primary = schema.primary_field()?.name.clone();
            let embedding = Self::embedding_field(schema)?;

            let mut keys = Vec::with_capacity(indices.len());
            let mut payload = Vec::with_capacity(indices.len());
            for index in indices {
                let key = Self::mint_key();
                payload.push(Self::vector_payload(
                    &entities[*index],
                    embedding,
                    &primary,
                    key,
                )?);
                keys.push(key);
            }

            self.api.upsert(&name, payload).await?;
            if show_progress {
                info!(
                    collection = %name,
                    group = group_index + 1,
                    groups = groups.len(),
                    rows = indices.len(),
                    "upserted batch group"
                );
            }
            keys_per_group.push(keys);
        }

        Ok(remap_group_keys(entities.len(), &groups, keys_per_group))
    }

    async fn delete(&self, entity: &Entity) -> Result<(), BackendError> {
        let schema = entity.schema();
        let name = Self::index_name(schema)?;
        let key = entity
            .primary_key()?
            .ok_or_else(|| BackendError::MissingPrimaryKeyValue {
                collection: schema.collection_name().to_string(),
            })?;
        self.api.delete_vectors(&name, &[key.to_string()]).await?;
        Ok(())
    }

    async fn search(
        &self,
        schema: &SchemaRef,
        request: SearchRequest,
    ) -> Result<Vec<QueryResult>, BackendError> {
        if request.offset > 0 {
            return Err(BackendError::OffsetUnsupported {
                backend: "Pinecone",
            });
        }
        // Metadata stops being returned past this size, which would strip
        // every scalar attribute from the results.
        if request.limit > MAX_FETCH_SIZE {
            return Err(BackendError::FetchTooLarge {
                backend: "Pinecone",
                limit: request.limit,
                offset: request.offset,
                max: MAX_FETCH_SIZE,
            });
        }

        let name = Self::index_name(schema)?;
        let primary = schema.primary_field()?.name.clone();
        let embedding = Self::embedding_field(schema)?;

        // The service always searches by vector. A scalar query substitutes
        // a zero vector and drops the meaningless scores afterwards.
        let (vector, scored) = match &request.similarity {
            Some(target) => {
                let Value::FloatVector(values) = &target.vector else {
                    return Err(BackendError::BinaryEmbeddingsUnsupported {
                        backend: "Pinecone",
                    });
                };
                embedding
                    .kind
                    .check(schema.collection_name(), &target.field, &target.vector)?;
                (values.clone(), true)
            }
            None => {
                info!(
                    collection = %name,
                    "no query vector supplied, searching with a zero vector to retrieve content"
                );
                (vec![0.0; Self::embedding_dim(embedding)], false)
            }
        };

        let matches = self
            .api
            .query(PineconeQueryRequest {
                index: name,
                vector,
                top_k: request.limit,
                filter: Self::filter_payload(&request.filters)?,
                include_values: false,
                include_metadata: true,
            })
            .await?;

        let mut results = Vec::with_capacity(matches.len());
        for item in matches {
            results.push(Self::result_from_match(
                schema,
                &request.output_fields,
                &primary,
                item,
                scored,
            )?);
        }
        Ok(results)
    }

    async fn flush(&self, _schema: &SchemaRef) -> Result<(), BackendError> {
        // No local buffering is involved in Pinecone.
        Ok(())
    }

    async fn load(&self, _schema: &SchemaRef) -> Result<(), BackendError> {
        Ok(())
    }
}
