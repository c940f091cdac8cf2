// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! In-memory stand-ins for the remote Milvus and Pinecone services
//!
//! The mocks store rows, evaluate the translated filter payloads, and rank
//! by naive exact distance, which is all the integration tests need from the
//! "remote engine" side of the contract.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};

use vector_orm::backends::milvus::{
    MilvusCollectionSpec, MilvusColumnValues, MilvusFieldColumn, MilvusHit, MilvusIndexSpec,
    MilvusQueryVector, MilvusRow, MilvusRpc, MilvusScalarQuery, MilvusVectorQuery,
};
use vector_orm::backends::pinecone::{
    PineconeApi, PineconeIndexSpec, PineconeMatch, PineconeQueryRequest, PineconeVector,
};
use vector_orm::RemoteError;

/// Route backend tracing into test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Milvus mock
// ============================================================================

#[derive(Debug, Clone)]
enum StoredVector {
    Float(Vec<f32>),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
struct StoredRow {
    id: i64,
    scalars: JsonMap<String, JsonValue>,
    vectors: HashMap<String, StoredVector>,
}

struct MilvusCollection {
    spec: MilvusCollectionSpec,
    indexes: Vec<MilvusIndexSpec>,
    rows: Vec<StoredRow>,
    next_id: i64,
}

impl MilvusCollection {
    fn primary_name(&self) -> String {
        self.spec
            .fields
            .iter()
            .find(|f| f.is_primary)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "id".to_string())
    }
}

/// Records every index spec and search request it receives and answers
/// searches with exact L2/Hamming ranking.
#[derive(Default)]
pub struct MockMilvus {
    collections: Mutex<HashMap<String, MilvusCollection>>,
    last_search: Mutex<Option<MilvusVectorQuery>>,
}

impl MockMilvus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_specs(&self, collection: &str) -> Vec<MilvusIndexSpec> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.rows.len())
            .unwrap_or(0)
    }

    pub fn last_search(&self) -> Option<MilvusVectorQuery> {
        self.last_search.lock().unwrap().clone()
    }
}

#[async_trait]
impl MilvusRpc for MockMilvus {
    async fn create_collection(&self, spec: MilvusCollectionSpec) -> Result<(), RemoteError> {
        let mut collections = self.collections.lock().unwrap();
        collections.insert(
            spec.name.clone(),
            MilvusCollection {
                spec,
                indexes: Vec::new(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> Result<bool, RemoteError> {
        Ok(self.collections.lock().unwrap().contains_key(name))
    }

    async fn drop_collection(&self, name: &str) -> Result<(), RemoteError> {
        self.collections
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RemoteError::new(format!("collection `{name}` does not exist")))
    }

    async fn create_index(
        &self,
        collection: &str,
        spec: MilvusIndexSpec,
    ) -> Result<(), RemoteError> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .get_mut(collection)
            .ok_or_else(|| RemoteError::new("unknown collection"))?;
        collection.indexes.push(spec);
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        columns: Vec<MilvusFieldColumn>,
    ) -> Result<Vec<i64>, RemoteError> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .get_mut(collection)
            .ok_or_else(|| RemoteError::new("unknown collection"))?;
        let primary = collection.primary_name();

        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        for column in &columns {
            if column.values.len() != rows {
                return Err(RemoteError::new("ragged insert payload"));
            }
        }

        let mut keys = Vec::with_capacity(rows);
        for row_index in 0..rows {
            let id = collection.next_id;
            collection.next_id += 1;

            let mut scalars = JsonMap::new();
            scalars.insert(primary.clone(), JsonValue::from(id));
            let mut vectors = HashMap::new();

            for column in &columns {
                match &column.values {
                    MilvusColumnValues::Int64(v) => {
                        scalars.insert(column.name.clone(), JsonValue::from(v[row_index]));
                    }
                    MilvusColumnValues::Double(v) => {
                        scalars.insert(column.name.clone(), JsonValue::from(v[row_index]));
                    }
                    MilvusColumnValues::Bool(v) => {
                        scalars.insert(column.name.clone(), JsonValue::from(v[row_index]));
                    }
                    MilvusColumnValues::VarChar(v) => {
                        scalars.insert(column.name.clone(), JsonValue::from(v[row_index].clone()));
                    }
                    MilvusColumnValues::FloatVector(v) => {
                        vectors.insert(
                            column.name.clone(),
                            StoredVector::Float(v[row_index].clone()),
                        );
                    }
                    MilvusColumnValues::BinaryVector(v) => {
                        vectors.insert(
                            column.name.clone(),
                            StoredVector::Binary(v[row_index].clone()),
                        );
                    }
                }
            }

            collection.rows.push(StoredRow {
                id,
                scalars,
                vectors,
            });
            keys.push(id);
        }
        Ok(keys)
    }

    async fn delete(&self, collection: &str, expression: &str) -> Result<(), RemoteError> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .get_mut(collection)
            .ok_or_else(|| RemoteError::new("unknown collection"))?;

        // Only the `field in [keys]` form reaches the delete RPC.
        let (field, rest) = expression
            .split_once(" in [")
            .ok_or_else(|| RemoteError::new(format!("unsupported expression `{expression}`")))?;
        let keys: Vec<i64> = rest
            .trim_end_matches(']')
            .split(',')
            .map(|k| k.trim().parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|_| RemoteError::new("invalid key list"))?;

        collection.rows.retain(|row| {
            row.scalars
                .get(field)
                .and_then(|v| v.as_i64())
                .map(|v| !keys.contains(&v))
                .unwrap_or(true)
        });
        Ok(())
    }

    async fn search(&self, request: MilvusVectorQuery) -> Result<Vec<MilvusHit>, RemoteError> {
        *self.last_search.lock().unwrap() = Some(request.clone());
        let collections = self.collections.lock().unwrap();
        let collection = collections
            .get(&request.collection)
            .ok_or_else(|| RemoteError::new("unknown collection"))?;

        let mut scored: Vec<(f32, &StoredRow)> = Vec::new();
        for row in &collection.rows {
            if !matches_expression(&row.scalars, request.expression.as_deref())? {
                continue;
            }
            let Some(stored) = row.vectors.get(&request.anns_field) else {
                continue;
            };
            let distance = match (stored, &request.vector) {
                (StoredVector::Float(row_vec), MilvusQueryVector::Float(query)) => row_vec
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt(),
                (StoredVector::Binary(row_vec), MilvusQueryVector::Binary(query)) => row_vec
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a ^ b).count_ones())
                    .sum::<u32>() as f32,
                _ => return Err(RemoteError::new("query vector type mismatch")),
            };
            scored.push((distance, row));
        }

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|(distance, row)| MilvusHit {
                id: row.id,
                score: distance,
                distance,
                entity: project(&row.scalars, &request.output_fields),
            })
            .collect())
    }

    async fn query(&self, request: MilvusScalarQuery) -> Result<Vec<MilvusRow>, RemoteError> {
        let collections = self.collections.lock().unwrap();
        let collection = collections
            .get(&request.collection)
            .ok_or_else(|| RemoteError::new("unknown collection"))?;

        let mut rows = Vec::new();
        for row in &collection.rows {
            if matches_expression(&row.scalars, request.expression.as_deref())? {
                rows.push(project(&row.scalars, &request.output_fields));
            }
        }
        Ok(rows
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect())
    }

    async fn flush(&self, _collections: &[String]) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn load_collection(&self, _name: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

fn project(
    scalars: &JsonMap<String, JsonValue>,
    output_fields: &[String],
) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    for field in output_fields {
        if let Some(value) = scalars.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    out
}

/// Evaluate a conjunctive `field OP value` expression the way the real
/// engine would.
fn matches_expression(
    scalars: &JsonMap<String, JsonValue>,
    expression: Option<&str>,
) -> Result<bool, RemoteError> {
    let Some(expression) = expression else {
        return Ok(true);
    };
    for clause in expression.split(" and ") {
        if !matches_clause(scalars, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_clause(
    scalars: &JsonMap<String, JsonValue>,
    clause: &str,
) -> Result<bool, RemoteError> {
    // Two-character operators first so ">=" does not parse as ">".
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        let Some((field, operand)) = clause.split_once(&format!(" {op} ")) else {
            continue;
        };
        let Some(actual) = scalars.get(field.trim()) else {
            return Ok(false);
        };
        let operand = parse_operand(operand.trim())?;

        let ordering = if let (Some(a), Some(b)) = (actual.as_f64(), operand.as_f64()) {
            a.partial_cmp(&b)
        } else if let (Some(a), Some(b)) = (actual.as_str(), operand.as_str()) {
            Some(a.cmp(b))
        } else if let (Some(a), Some(b)) = (actual.as_bool(), operand.as_bool()) {
            Some(a.cmp(&b))
        } else {
            None
        };
        let Some(ordering) = ordering else {
            return Ok(false);
        };

        return Ok(match op {
            "==" => ordering.is_eq(),
            "!=" => !ordering.is_eq(),
            ">=" => ordering.is_ge(),
            "<=" => ordering.is_le(),
            ">" => ordering.is_gt(),
            "<" => ordering.is_lt(),
            _ => unreachable!(),
        });
    }
    Err(RemoteError::new(format!("unsupported clause `{clause}`")))
}

fn parse_operand(raw: &str) -> Result<JsonValue, RemoteError> {
    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return Ok(JsonValue::from(
            inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        ));
    }
    if raw == "true" {
        return Ok(JsonValue::from(true));
    }
    if raw == "false" {
        return Ok(JsonValue::from(false));
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(JsonValue::from(value));
    }
    raw.parse::<f64>()
        .map(JsonValue::from)
        .map_err(|_| RemoteError::new(format!("invalid operand `{raw}`")))
}

// ============================================================================
// Pinecone mock
// ============================================================================

struct PineconeIndexState {
    spec: PineconeIndexSpec,
    vectors: HashMap<String, PineconeVector>,
}

#[derive(Default)]
pub struct MockPinecone {
    indexes: Mutex<HashMap<String, PineconeIndexState>>,
}

impl MockPinecone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector_count(&self, index: &str) -> usize {
        self.indexes
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.vectors.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PineconeApi for MockPinecone {
    async fn list_indexes(&self) -> Result<Vec<String>, RemoteError> {
        Ok(self.indexes.lock().unwrap().keys().cloned().collect())
    }

    async fn create_index(&self, spec: PineconeIndexSpec) -> Result<(), RemoteError> {
        let mut indexes = self.indexes.lock().unwrap();
        indexes.insert(
            spec.name.clone(),
            PineconeIndexState {
                spec,
                vectors: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), RemoteError> {
        self.indexes
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RemoteError::new(format!("index `{name}` does not exist")))
    }

    async fn upsert(&self, index: &str, vectors: Vec<PineconeVector>) -> Result<(), RemoteError> {
        let mut indexes = self.indexes.lock().unwrap();
        let state = indexes
            .get_mut(index)
            .ok_or_else(|| RemoteError::new("unknown index"))?;
        for vector in vectors {
            if vector.values.len() != state.spec.dimension {
                return Err(RemoteError::new("vector dimension mismatch"));
            }
            state.vectors.insert(vector.id.clone(), vector);
        }
        Ok(())
    }

    async fn delete_vectors(&self, index: &str, ids: &[String]) -> Result<(), RemoteError> {
        let mut indexes = self.indexes.lock().unwrap();
        let state = indexes
            .get_mut(index)
            .ok_or_else(|| RemoteError::new("unknown index"))?;
        for id in ids {
            state.vectors.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self, index: &str) -> Result<(), RemoteError> {
        let mut indexes = self.indexes.lock().unwrap();
        let state = indexes
            .get_mut(index)
            .ok_or_else(|| RemoteError::new("unknown index"))?;
        state.vectors.clear();
        Ok(())
    }

    async fn query(
        &self,
        request: PineconeQueryRequest,
    ) -> Result<Vec<PineconeMatch>, RemoteError> {
        let indexes = self.indexes.lock().unwrap();
        let state = indexes
            .get(&request.index)
            .ok_or_else(|| RemoteError::new("unknown index"))?;

        let mut scored: Vec<(f32, &PineconeVector)> = Vec::new();
        for vector in state.vectors.values() {
            if !matches_filter(&vector.metadata, request.filter.as_ref()) {
                continue;
            }
            let distance = vector
                .values
                .iter()
                .zip(&request.vector)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt();
            scored.push((distance, vector));
        }

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(request.top_k)
            .map(|(distance, vector)| PineconeMatch {
                id: vector.id.clone(),
                score: -distance,
                metadata: vector.metadata.clone(),
            })
            .collect())
    }
}

/// Evaluate a Mongo-style `{field: {"$op": value}}` filter map.
fn matches_filter(metadata: &JsonValue, filter: Option<&JsonValue>) -> bool {
    let Some(JsonValue::Object(filter)) = filter else {
        return true;
    };
    let Some(metadata) = metadata.as_object() else {
        return false;
    };

    for (field, ops) in filter {
        let Some(actual) = metadata.get(field) else {
            return false;
        };
        let Some(ops) = ops.as_object() else {
            return false;
        };
        for (op, operand) in ops {
            let ordering = if let (Some(a), Some(b)) = (actual.as_f64(), operand.as_f64()) {
                a.partial_cmp(&b)
            } else if let (Some(a), Some(b)) = (actual.as_str(), operand.as_str()) {
                Some(a.cmp(b))
            } else if let (Some(a), Some(b)) = (actual.as_bool(), operand.as_bool()) {
                Some(a.cmp(&b))
            } else {
                None
            };
            let Some(ordering) = ordering else {
                return false;
            };
            let ok = match op.as_str() {
                "$eq" => ordering.is_eq(),
                "$ne" => !ordering.is_eq(),
                "$gt" => ordering.is_gt(),
                "$gte" => ordering.is_ge(),
                "$lt" => ordering.is_lt(),
                "$lte" => ordering.is_le(),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
    }
    true
}
