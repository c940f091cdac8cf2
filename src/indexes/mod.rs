// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Index descriptors for embedding attributes
//!
//! Every embedding carries one index descriptor. Descriptors are pure data:
//! they validate their numeric parameters and metric compatibility at
//! construction time and expose two disjoint parameter sets, one used when
//! the collection is created and one reused on every similarity query.

pub mod milvus;
pub mod pinecone;

pub use milvus::{MilvusIndex, MilvusMetric};
pub use pinecone::{PineconeIndex, PineconeMetric};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors raised while constructing an index descriptor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("{parameter} must be between {min} and {max}, got {value}")]
    ParameterOutOfRange {
        parameter: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },

    #[error("inference_comparison must be between 1 and cluster_units ({cluster_units}), got {value}")]
    InferenceComparisonOutOfRange { cluster_units: u32, value: u32 },

    #[error("metric {metric} is not supported by index type {index_type}")]
    IncompatibleMetric {
        index_type: &'static str,
        metric: String,
    },
}

/// Whether an index (and its metric) operates on floating-point or binary
/// vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricFamily {
    Floating,
    Binary,
}

/// Closed set of index descriptors across the supported backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorIndex {
    Milvus(MilvusIndex),
    Pinecone(PineconeIndex),
}

impl VectorIndex {
    pub fn index_type(&self) -> &'static str {
        match self {
            VectorIndex::Milvus(index) => index.index_type(),
            VectorIndex::Pinecone(_) => "PINECONE",
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            VectorIndex::Milvus(index) => index.metric().wire_name(),
            VectorIndex::Pinecone(index) => index.metric().wire_name(),
        }
    }

    pub fn metric_family(&self) -> MetricFamily {
        match self {
            VectorIndex::Milvus(index) => index.family(),
            VectorIndex::Pinecone(_) => MetricFamily::Floating,
        }
    }

    /// Parameters used once, at collection/index creation time.
    pub fn index_parameters(&self) -> JsonValue {
        match self {
            VectorIndex::Milvus(index) => index.index_parameters(),
            VectorIndex::Pinecone(index) => index.index_parameters(),
        }
    }

    /// Parameters reused on every similarity query.
    pub fn inference_parameters(&self) -> JsonValue {
        match self {
            VectorIndex::Milvus(index) => index.inference_parameters(),
            VectorIndex::Pinecone(index) => index.inference_parameters(),
        }
    }
}

impl From<MilvusIndex> for VectorIndex {
    fn from(index: MilvusIndex) -> Self {
        VectorIndex::Milvus(index)
    }
}

impl From<PineconeIndex> for VectorIndex {
    fn from(index: PineconeIndex) -> Self {
        VectorIndex::Pinecone(index)
    }
}
