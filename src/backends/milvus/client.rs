// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Wire shapes and the client contract for the Milvus remote service
//!
//! The actual RPC transport is an external collaborator: the backend only
//! depends on this trait. Implementations are expected to map these calls
//! onto the Milvus `insert`/`delete`/`search`/`query` RPCs one to one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backends::RemoteError;

/// Storage types understood by Milvus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilvusDataType {
    Int64,
    Double,
    Bool,
    VarChar,
    FloatVector,
    BinaryVector,
}

/// One field of a collection schema as Milvus sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusFieldSpec {
    pub name: String,
    pub data_type: MilvusDataType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusCollectionSpec {
    pub name: String,
    pub description: String,
    pub fields: Vec<MilvusFieldSpec>,
}

/// Index creation request for one embedding field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusIndexSpec {
    pub field_name: String,
    pub index_type: String,
    pub metric_type: String,
    pub params: JsonValue,
}

/// Columnar values for one field across a whole insert. Binary vectors are
/// already bit-packed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MilvusColumnValues {
    Int64(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    VarChar(Vec<String>),
    FloatVector(Vec<Vec<f32>>),
    BinaryVector(Vec<Vec<u8>>),
}

impl MilvusColumnValues {
    pub fn len(&self) -> usize {
        match self {
            MilvusColumnValues::Int64(v) => v.len(),
            MilvusColumnValues::Double(v) => v.len(),
            MilvusColumnValues::Bool(v) => v.len(),
            MilvusColumnValues::VarChar(v) => v.len(),
            MilvusColumnValues::FloatVector(v) => v.len(),
            MilvusColumnValues::BinaryVector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusFieldColumn {
    pub name: String,
    pub data_type: MilvusDataType,
    pub values: MilvusColumnValues,
}

/// Query vector in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MilvusQueryVector {
    Float(Vec<f32>),
    Binary(Vec<u8>),
}

/// Parameters of a similarity search (`search` RPC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusVectorQuery {
    pub collection: String,
    pub vector: MilvusQueryVector,
    pub anns_field: String,
    /// Inference-time index parameters.
    pub params: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub output_fields: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<String>,
}

/// Parameters of a predicate-only fetch (`query` RPC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusScalarQuery {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub output_fields: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<String>,
}

/// One similarity hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilvusHit {
    pub id: i64,
    pub score: f32,
    pub distance: f32,
    pub entity: serde_json::Map<String, JsonValue>,
}

/// One row of a scalar query result.
pub type MilvusRow = serde_json::Map<String, JsonValue>;

/// Remote Milvus service contract.
#[async_trait]
pub trait MilvusRpc: Send + Sync {
    async fn create_collection(&self, spec: MilvusCollectionSpec) -> Result<(), RemoteError>;

    async fn has_collection(&self, name: &str) -> Result<bool, RemoteError>;

    async fn drop_collection(&self, name: &str) -> Result<(), RemoteError>;

    async fn create_index(&self, collection: &str, spec: MilvusIndexSpec)
        -> Result<(), RemoteError>;

    /// Columnar insert; returns the assigned primary keys in row order.
    async fn insert(
        &self,
        collection: &str,
        columns: Vec<MilvusFieldColumn>,
    ) -> Result<Vec<i64>, RemoteError>;

    /// Delete every row matching the boolean expression.
    async fn delete(&self, collection: &str, expression: &str) -> Result<(), RemoteError>;

    /// Similarity search; results ordered best first.
    async fn search(&self, request: MilvusVectorQuery) -> Result<Vec<MilvusHit>, RemoteError>;

    /// Predicate-only fetch.
    async fn query(&self, request: MilvusScalarQuery) -> Result<Vec<MilvusRow>, RemoteError>;

    async fn flush(&self, collections: &[String]) -> Result<(), RemoteError>;

    async fn load_collection(&self, name: &str) -> Result<(), RemoteError>;
}
