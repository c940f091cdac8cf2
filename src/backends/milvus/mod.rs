// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Milvus backend adapter
//!
//! Translates schemas into Milvus collection/index specs, entities into
//! columnar insert payloads, and search requests into the `search` (vector)
//! or `query` (scalar) RPC, depending on whether a similarity target is
//! present. Filters become boolean expression strings.

pub mod client;

pub use client::{
    MilvusCollectionSpec, MilvusColumnValues, MilvusDataType, MilvusFieldColumn, MilvusFieldSpec,
    MilvusHit, MilvusIndexSpec, MilvusQueryVector, MilvusRow, MilvusRpc, MilvusScalarQuery,
    MilvusVectorQuery,
};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::backends::{
    check_fetch_window, check_index_element, group_by_collection, pack_bits, remap_group_keys,
    BackendError, RemoteError, SearchRequest, VectorBackend,
};
use crate::indexes::VectorIndex;
use crate::query::expr::{CompareOp, Condition};
use crate::results::QueryResult;
use crate::schema::fields::{FieldDescriptor, FieldKind, ScalarKind, Value, VectorElement};
use crate::schema::{Entity, SchemaError, SchemaRef};

/// https://milvus.io/docs/search.md
pub const MAX_FETCH_SIZE: usize = 16384;

/// https://milvus.io/docs/limitations.md
pub const MAX_DIMENSION: usize = 32768;

pub struct MilvusBackend {
    client: Arc<dyn MilvusRpc>,
}

impl MilvusBackend {
    pub fn new(client: Arc<dyn MilvusRpc>) -> Self {
        Self { client }
    }

    /// Validate primary-key cardinality and every embedding's index before
    /// provisioning anything remotely.
    fn check_schema(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        schema.primary_field()?;

        let collection = schema.collection_name();
        for field in schema.embedding_fields() {
            let FieldKind::Embedding { dim, index, .. } = &field.kind else {
                continue;
            };
            if !matches!(index, VectorIndex::Milvus(_)) {
                return Err(BackendError::UnsupportedIndex {
                    backend: "Milvus",
                    index_type: index.index_type().to_string(),
                });
            }
            check_index_element(collection, &field.name, &field.kind)?;
            if *dim > MAX_DIMENSION {
                return Err(BackendError::DimensionTooLarge {
                    backend: "Milvus",
                    collection: collection.to_string(),
                    field: field.name.clone(),
                    dim: *dim,
                    max: MAX_DIMENSION,
                });
            }
        }
        Ok(())
    }

    fn field_spec(field: &FieldDescriptor) -> MilvusFieldSpec {
        let (data_type, is_primary, dim, max_length) = match &field.kind {
            FieldKind::PrimaryKey => (MilvusDataType::Int64, true, None, None),
            FieldKind::VarChar { max_length } => {
                (MilvusDataType::VarChar, false, None, Some(*max_length))
            }
            FieldKind::Embedding { dim, element, .. } => {
                let data_type = match element {
                    VectorElement::Float32 => MilvusDataType::FloatVector,
                    VectorElement::Binary => MilvusDataType::BinaryVector,
                };
                (data_type, false, Some(*dim), None)
            }
            FieldKind::Scalar(ScalarKind::Int64) => (MilvusDataType::Int64, false, None, None),
            FieldKind::Scalar(ScalarKind::Float64) => (MilvusDataType::Double, false, None, None),
            FieldKind::Scalar(ScalarKind::Bool) => (MilvusDataType::Bool, false, None, None),
        };
        MilvusFieldSpec {
            name: field.name.clone(),
            data_type,
            is_primary,
            // Primary keys are assigned by the engine.
            auto_id: is_primary,
            dim,
            max_length,
        }
    }

    /// Build one columnar payload for a field from its non-null values.
    fn column(
        collection: &str,
        field: &FieldDescriptor,
        values: &[&Value],
    ) -> Result<MilvusFieldColumn, BackendError> {
        let mismatch = |value: &Value| {
            BackendError::Schema(SchemaError::TypeMismatch {
                schema: collection.to_string(),
                attribute: field.name.clone(),
                expected: field.kind.type_name(),
                actual: value.type_name().to_string(),
            })
        };

        let (data_type, column) = match &field.kind {
            FieldKind::PrimaryKey | FieldKind::Scalar(ScalarKind::Int64) => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Int(v) => out.push(*v),
                        other => return Err(mismatch(other)),
                    }
                }
                (MilvusDataType::Int64, MilvusColumnValues::Int64(out))
            }
            FieldKind::Scalar(ScalarKind::Float64) => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Float(v) => out.push(*v),
                        other => return Err(mismatch(other)),
                    }
                }
                (MilvusDataType::Double, MilvusColumnValues::Double(out))
            }
            FieldKind::Scalar(ScalarKind::Bool) => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Bool(v) => out.push(*v),
                        other => return Err(mismatch(other)),
                    }
                }
                (MilvusDataType::Bool, MilvusColumnValues::Bool(out))
            }
            FieldKind::VarChar { .. } => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::Text(v) => out.push(v.clone()),
                        other => return Err(mismatch(other)),
                    }
                }
                (MilvusDataType::VarChar, MilvusColumnValues::VarChar(out))
            }
            FieldKind::Embedding {
                element: VectorElement::Float32,
                ..
            } => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::FloatVector(v) => out.push(v.clone()),
                        other => return Err(mismatch(other)),
                    }
                }
                (
                    MilvusDataType::FloatVector,
                    MilvusColumnValues::FloatVector(out),
                )
            }
            FieldKind::Embedding {
                element: VectorElement::Binary,
                ..
            } => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        Value::BinaryVector(v) => out.push(pack_bits(v)),
                        other => return Err(mismatch(other)),
                    }
                }
                (
                    MilvusDataType::BinaryVector,
                    MilvusColumnValues::BinaryVector(out),
                )
            }
        };

        Ok(MilvusFieldColumn {
            name: field.name.clone(),
            data_type,
            values: column,
        })
    }

    /// Columnar representation of one entity's non-null attributes.
    fn entity_columns(entity: &Entity) -> Result<Vec<MilvusFieldColumn>, BackendError> {
        let schema = entity.schema();
        let mut columns = Vec::new();
        for field in schema.fields() {
            let value = entity.get(&field.name)?;
            if value.is_null() {
                continue;
            }
            columns.push(Self::column(
                schema.collection_name(),
                field,
                &[value],
            )?);
        }
        Ok(columns)
    }

    fn expression(filters: &[Condition]) -> Result<Option<String>, BackendError> {
        if filters.is_empty() {
            return Ok(None);
        }
        let rendered: Vec<String> = filters
            .iter()
            .map(condition_expression)
            .collect::<Result<_, _>>()?;
        Ok(Some(rendered.join(" and ")))
    }

    fn consistency(schema: &SchemaRef) -> Option<String> {
        schema.consistency().map(|c| c.wire_name().to_string())
    }
}

#[async_trait]
impl VectorBackend for MilvusBackend {
    fn max_fetch_size(&self) -> usize {
        MAX_FETCH_SIZE
    }

    async fn create_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.check_schema(schema)?;

        let collection = schema.collection_name();
        let fields: Vec<MilvusFieldSpec> = schema.fields().iter().map(Self::field_spec).collect();

        info!(collection, "creating collection");
        self.client
            .create_collection(MilvusCollectionSpec {
                name: collection.to_string(),
                description: format!("{collection} vector-orm generated collection"),
                fields,
            })
            .await?;

        for field in schema.embedding_fields() {
            let FieldKind::Embedding {
                index: VectorIndex::Milvus(index),
                ..
            } = &field.kind
            else {
                continue;
            };
            let spec = MilvusIndexSpec {
                field_name: field.name.clone(),
                index_type: index.index_type().to_string(),
                metric_type: index.metric().wire_name().to_string(),
                params: index.index_parameters(),
            };
            info!(collection, field = %field.name, index_type = %spec.index_type, "creating index");
            self.client.create_index(collection, spec).await?;
        }

        Ok(())
    }

    async fn clear_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        // Milvus can only delete rows by listing explicit primary keys, so
        // the cheapest full wipe is drop plus recreate.
        self.delete_collection(schema).await?;
        self.create_collection(schema).await
    }

    async fn delete_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        let collection = schema.collection_name();
        if !self.client.has_collection(collection).await? {
            return Ok(());
        }
        self.client.drop_collection(collection).await?;
        Ok(())
    }

    async fn insert(&self, entity: &Entity) -> Result<i64, BackendError> {
        let schema = entity.schema();
        schema.primary_field()?;

        let columns = Self::entity_columns(entity)?;
        let keys = self
            .client
            .insert(schema.collection_name(), columns)
            .await?;
        keys.into_iter().next().ok_or_else(|| {
            RemoteError::new("Milvus insert returned no primary keys").into()
        })
    }

    async fn insert_batch(
        &self,
        entities: &[Entity],
        show_progress: bool,
    ) -> Result<Vec<i64>, BackendError> {
        if show_progress {
            return Err(BackendError::ProgressUnsupported { backend: "Milvus" });
        }

        let groups = group_by_collection(entities);
        let mut keys_per_group = Vec::with_capacity(groups.len());

        for (schema, indices) in &groups {
            let collection = schema.collection_name();
            let primary = schema.primary_field()?.name.clone();

            // Group the entities' values by attribute. The primary key is
            // still unassigned at this point, so it is skipped outright.
            let mut columns = Vec::new();
            for field in schema.fields() {
                if field.name == primary {
                    continue;
                }
                let mut values = Vec::with_capacity(indices.len());
                for index in indices {
                    match entities[*index].get(&field.name) {
                        Ok(value) if !value.is_null() => values.push(value),
                        _ => {}
                    }
                }
                if values.is_empty() {
                    continue;
                }
                // A count that differs from the group size means some
                // entities carry the attribute and some do not. Inserting
                // anyway would silently misalign rows, so this aborts.
                if values.len() != indices.len() {
                    return Err(BackendError::BatchMisaligned {
                        collection: collection.to_string(),
                        field: field.name.clone(),
                        expected: indices.len(),
                        actual: values.len(),
                    });
                }
                columns.push(Self::column(collection, field, &values)?);
            }

            let keys = self.client.insert(collection, columns).await?;
            if keys.len() != indices.len() {
                return Err(RemoteError::new(format!(
                    "Milvus returned {} primary keys for {} inserted rows",
                    keys.len(),
                    indices.len()
                ))
                .into());
            }
            keys_per_group.push(keys);
        }

        Ok(remap_group_keys(entities.len(), &groups, keys_per_group))
    }

    async fn delete(&self, entity: &Entity) -> Result<(), BackendError> {
        let schema = entity.schema();
        let primary = schema.primary_field()?.name.clone();
        let key = entity
            .primary_key()?
            .ok_or_else(|| BackendError::MissingPrimaryKeyValue {
                collection: schema.collection_name().to_string(),
            })?;

        // Milvus only deletes with the `in` conditional; equality doesn't
        // work.
        let expression = format!("{primary} in [{key}]");
        self.client
            .delete(schema.collection_name(), &expression)
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        schema: &SchemaRef,
        request: SearchRequest,
    ) -> Result<Vec<QueryResult>, BackendError> {
        check_fetch_window("Milvus", MAX_FETCH_SIZE, request.limit, request.offset)?;

        let collection = schema.collection_name();
        let expression = Self::expression(&request.filters)?;
        let consistency_level = Self::consistency(schema);

        // A `search` is issued when ranking by vector similarity; a `query`
        // covers plain predicate fetches.
        match &request.similarity {
            Some(target) => {
                let field = schema.descriptor(&target.field).ok_or_else(|| {
                    SchemaError::UnknownAttribute {
                        schema: collection.to_string(),
                        attribute: target.field.clone(),
                    }
                })?;
                let FieldKind::Embedding { dim, index, .. } = &field.kind else {
                    return Err(SchemaError::TypeMismatch {
                        schema: collection.to_string(),
                        attribute: target.field.clone(),
                        expected: "FloatVector".to_string(),
                        actual: field.kind.type_name(),
                    }
                    .into());
                };
                let VectorIndex::Milvus(index) = index else {
                    return Err(BackendError::UnsupportedIndex {
                        backend: "Milvus",
                        index_type: index.index_type().to_string(),
                    });
                };

                field
                    .kind
                    .check(collection, &target.field, &target.vector)?;
                let vector = match &target.vector {
                    Value::FloatVector(v) => MilvusQueryVector::Float(v.clone()),
                    Value::BinaryVector(v) => MilvusQueryVector::Binary(pack_bits(v)),
                    other => {
                        return Err(SchemaError::TypeMismatch {
                            schema: collection.to_string(),
                            attribute: target.field.clone(),
                            expected: format!("{dim}-dimensional vector"),
                            actual: other.type_name().to_string(),
                        }
                        .into())
                    }
                };

                let hits = self
                    .client
                    .search(MilvusVectorQuery {
                        collection: collection.to_string(),
                        vector,
                        anns_field: target.field.clone(),
                        params: index.inference_parameters(),
                        expression,
                        output_fields: request.output_fields.clone(),
                        limit: request.limit,
                        offset: request.offset,
                        consistency_level,
                    })
                    .await?;

                let mut results = Vec::with_capacity(hits.len());
                for hit in hits {
                    let mut entity = Entity::from_json_record(schema, &hit.entity)?;
                    entity.set_primary_key(Some(hit.id))?;
                    results.push(QueryResult::with_similarity(entity, hit.score, hit.distance));
                }
                Ok(results)
            }
            None => {
                let rows = self
                    .client
                    .query(MilvusScalarQuery {
                        collection: collection.to_string(),
                        expression,
                        output_fields: request.output_fields.clone(),
                        limit: request.limit,
                        offset: request.offset,
                        consistency_level,
                    })
                    .await?;

                let mut results = Vec::with_capacity(rows.len());
                for row in rows {
                    results.push(QueryResult::new(Entity::from_json_record(schema, &row)?));
                }
                Ok(results)
            }
        }
    }

    async fn flush(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.client
            .flush(&[schema.collection_name().to_string()])
            .await?;
        Ok(())
    }

    async fn load(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.client
            .load_collection(schema.collection_name())
            .await?;
        Ok(())
    }
}

fn condition_expression(condition: &Condition) -> Result<String, BackendError> {
    let symbol = match condition.op {
        CompareOp::Eq => "==",
        CompareOp::Ne => "!=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
    };

    let value = match &condition.value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Text(v) => format!("\"{}\"", escape_text(v)),
        other => {
            return Err(BackendError::UnsupportedFilterValue {
                field: condition.field.clone(),
                kind: other.type_name(),
            })
        }
    };

    Ok(format!("{} {} {}", condition.field, symbol, value))
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
