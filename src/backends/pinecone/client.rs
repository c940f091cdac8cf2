// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Wire shapes and the client contract for the Pinecone remote service
//!
//! Pinecone is consumed as an opaque REST service; credentials, transport,
//! and retries belong to the implementation of this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::backends::RemoteError;

/// Index creation request. Every listed metadata field is registered for
/// filtering: https://docs.pinecone.io/docs/manage-indexes#selective-metadata-indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeIndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub indexed_fields: Vec<String>,
}

/// One vector in upsert form: stringified id, raw values, and the scalar
/// attributes carried as metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeVector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeQueryRequest {
    pub index: String,
    pub vector: Vec<f32>,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonValue>,
    pub include_values: bool,
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeMatch {
    pub id: String,
    pub score: f32,
    pub metadata: JsonValue,
}

/// Remote Pinecone service contract.
#[async_trait]
pub trait PineconeApi: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>, RemoteError>;

    async fn create_index(&self, spec: PineconeIndexSpec) -> Result<(), RemoteError>;

    async fn delete_index(&self, name: &str) -> Result<(), RemoteError>;

    /// Upsert semantics: an existing id is replaced.
    async fn upsert(&self, index: &str, vectors: Vec<PineconeVector>) -> Result<(), RemoteError>;

    async fn delete_vectors(&self, index: &str, ids: &[String]) -> Result<(), RemoteError>;

    async fn delete_all(&self, index: &str) -> Result<(), RemoteError>;

    /// Similarity query; results ordered best first.
    async fn query(
        &self,
        request: PineconeQueryRequest,
    ) -> Result<Vec<PineconeMatch>, RemoteError>;
}
