// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pinecone index descriptor. Pinecone exposes a single index type
//! parameterized only by its similarity metric; all metrics operate on
//! floating-point vectors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PineconeMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl PineconeMetric {
    pub fn wire_name(&self) -> &'static str {
        match self {
            PineconeMetric::Cosine => "cosine",
            PineconeMetric::Euclidean => "euclidean",
            PineconeMetric::DotProduct => "dotproduct",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PineconeIndex {
    metric: PineconeMetric,
}

impl PineconeIndex {
    pub fn new(metric: PineconeMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> PineconeMetric {
        self.metric
    }

    pub fn index_parameters(&self) -> JsonValue {
        json!({})
    }

    pub fn inference_parameters(&self) -> JsonValue {
        json!({ "metric_type": self.metric.wire_name() })
    }
}
