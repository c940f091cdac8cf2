// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Milvus index descriptors: https://milvus.io/docs/index.md
//!
//! Binary index types only accept binary metrics and floating index types
//! only accept floating metrics; the constructors reject any other pairing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::indexes::{IndexError, MetricFamily};

/// Similarity metrics understood by Milvus. The wire names are used directly
/// in index and search parameters: https://milvus.io/docs/metric.md
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilvusMetric {
    /// Euclidean distance.
    L2,
    /// Inner product.
    Ip,
    Jaccard,
    Tanimoto,
    Hamming,
}

impl MilvusMetric {
    pub fn wire_name(&self) -> &'static str {
        match self {
            MilvusMetric::L2 => "L2",
            MilvusMetric::Ip => "IP",
            MilvusMetric::Jaccard => "JACCARD",
            MilvusMetric::Tanimoto => "TANIMOTO",
            MilvusMetric::Hamming => "HAMMING",
        }
    }

    pub fn family(&self) -> MetricFamily {
        match self {
            MilvusMetric::L2 | MilvusMetric::Ip => MetricFamily::Floating,
            MilvusMetric::Jaccard | MilvusMetric::Tanimoto | MilvusMetric::Hamming => {
                MetricFamily::Binary
            }
        }
    }
}

/// Milvus index descriptors, one variant per supported index type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MilvusIndex {
    /// Relatively small dataset, requires a 100% recall rate.
    Flat { metric: MilvusMetric },

    /// High-speed query, requires a recall rate as high as possible.
    IvfFlat {
        metric: MilvusMetric,
        nlist: u32,
        nprobe: u32,
    },

    /// High-speed query, limited memory resources, accepts a minor
    /// compromise in recall rate.
    IvfSq8 {
        metric: MilvusMetric,
        nlist: u32,
        nprobe: u32,
    },

    /// Very high-speed query, limited memory resources, accepts a
    /// substantial compromise in recall rate.
    IvfPq {
        metric: MilvusMetric,
        nlist: u32,
        nprobe: u32,
        m: Option<u32>,
        nbits: u32,
    },

    /// High-speed query with large memory resources.
    Hnsw {
        metric: MilvusMetric,
        m: u32,
        ef_construction: u32,
        ef: u32,
    },

    /// Binary counterpart of `Flat`.
    BinFlat { metric: MilvusMetric },

    /// Binary counterpart of `IvfFlat`.
    BinIvfFlat {
        metric: MilvusMetric,
        nlist: u32,
        nprobe: u32,
    },
}

impl MilvusIndex {
    pub fn flat(metric: Option<MilvusMetric>) -> Result<Self, IndexError> {
        let metric = resolve_metric("FLAT", MetricFamily::Floating, metric)?;
        Ok(MilvusIndex::Flat { metric })
    }

    /// `cluster_units` is the number of clusters (`nlist` in the docs);
    /// `inference_comparison` is the number of cluster centroids compared
    /// during inference (`nprobe`), defaulting to `cluster_units`.
    pub fn ivf_flat(
        cluster_units: u32,
        inference_comparison: Option<u32>,
        metric: Option<MilvusMetric>,
    ) -> Result<Self, IndexError> {
        let metric = resolve_metric("IVF_FLAT", MetricFamily::Floating, metric)?;
        let (nlist, nprobe) = check_cluster_units(cluster_units, inference_comparison)?;
        Ok(MilvusIndex::IvfFlat {
            metric,
            nlist,
            nprobe,
        })
    }

    pub fn ivf_sq8(
        cluster_units: u32,
        inference_comparison: Option<u32>,
        metric: Option<MilvusMetric>,
    ) -> Result<Self, IndexError> {
        let metric = resolve_metric("IVF_SQ8", MetricFamily::Floating, metric)?;
        let (nlist, nprobe) = check_cluster_units(cluster_units, inference_comparison)?;
        Ok(MilvusIndex::IvfSq8 {
            metric,
            nlist,
            nprobe,
        })
    }

    /// `low_dimension_bits` (`nbits`) defaults to 8 and must stay within
    /// 1..=16.
    pub fn ivf_pq(
        cluster_units: u32,
        product_quantization: Option<u32>,
        inference_comparison: Option<u32>,
        low_dimension_bits: Option<u32>,
        metric: Option<MilvusMetric>,
    ) -> Result<Self, IndexError> {
        let metric = resolve_metric("IVF_PQ", MetricFamily::Floating, metric)?;
        let (nlist, nprobe) = check_cluster_units(cluster_units, inference_comparison)?;
        if let Some(nbits) = low_dimension_bits {
            check_range("low_dimension_bits", 1, 16, nbits)?;
        }
        Ok(MilvusIndex::IvfPq {
            metric,
            nlist,
            nprobe,
            m: product_quantization,
            nbits: low_dimension_bits.unwrap_or(8),
        })
    }

    pub fn hnsw(
        max_degree: u32,
        search_scope_index: u32,
        search_scope_inference: u32,
        metric: Option<MilvusMetric>,
    ) -> Result<Self, IndexError> {
        let metric = resolve_metric("HNSW", MetricFamily::Floating, metric)?;
        check_range("max_degree", 4, 64, max_degree)?;
        check_range("search_scope_index", 8, 512, search_scope_index)?;
        // Technically bounded below by top_k, but top_k is unknown at index
        // definition time.
        check_range("search_scope_inference", 1, 32768, search_scope_inference)?;
        Ok(MilvusIndex::Hnsw {
            metric,
            m: max_degree,
            ef_construction: search_scope_index,
            ef: search_scope_inference,
        })
    }

    pub fn bin_flat(metric: Option<MilvusMetric>) -> Result<Self, IndexError> {
        let metric = resolve_metric("BIN_FLAT", MetricFamily::Binary, metric)?;
        Ok(MilvusIndex::BinFlat { metric })
    }

    pub fn bin_ivf_flat(
        cluster_units: u32,
        inference_comparison: Option<u32>,
        metric: Option<MilvusMetric>,
    ) -> Result<Self, IndexError> {
        let metric = resolve_metric("BIN_IVF_FLAT", MetricFamily::Binary, metric)?;
        let (nlist, nprobe) = check_cluster_units(cluster_units, inference_comparison)?;
        Ok(MilvusIndex::BinIvfFlat {
            metric,
            nlist,
            nprobe,
        })
    }

    pub fn index_type(&self) -> &'static str {
        match self {
            MilvusIndex::Flat { .. } => "FLAT",
            MilvusIndex::IvfFlat { .. } => "IVF_FLAT",
            MilvusIndex::IvfSq8 { .. } => "IVF_SQ8",
            MilvusIndex::IvfPq { .. } => "IVF_PQ",
            MilvusIndex::Hnsw { .. } => "HNSW",
            MilvusIndex::BinFlat { .. } => "BIN_FLAT",
            MilvusIndex::BinIvfFlat { .. } => "BIN_IVF_FLAT",
        }
    }

    pub fn metric(&self) -> MilvusMetric {
        match self {
            MilvusIndex::Flat { metric }
            | MilvusIndex::IvfFlat { metric, .. }
            | MilvusIndex::IvfSq8 { metric, .. }
            | MilvusIndex::IvfPq { metric, .. }
            | MilvusIndex::Hnsw { metric, .. }
            | MilvusIndex::BinFlat { metric }
            | MilvusIndex::BinIvfFlat { metric, .. } => *metric,
        }
    }

    /// Family of the index type itself, independent of the chosen metric.
    pub fn family(&self) -> MetricFamily {
        match self {
            MilvusIndex::BinFlat { .. } | MilvusIndex::BinIvfFlat { .. } => MetricFamily::Binary,
            _ => MetricFamily::Floating,
        }
    }

    pub fn index_parameters(&self) -> JsonValue {
        match self {
            MilvusIndex::Flat { .. } | MilvusIndex::BinFlat { .. } => json!({}),
            MilvusIndex::IvfFlat { nlist, .. }
            | MilvusIndex::IvfSq8 { nlist, .. }
            | MilvusIndex::BinIvfFlat { nlist, .. } => json!({ "nlist": nlist }),
            MilvusIndex::IvfPq { nlist, m, nbits, .. } => match m {
                Some(m) => json!({ "nlist": nlist, "m": m, "nbits": nbits }),
                None => json!({ "nlist": nlist, "nbits": nbits }),
            },
            MilvusIndex::Hnsw {
                m, ef_construction, ..
            } => json!({ "M": m, "efConstruction": ef_construction }),
        }
    }

    pub fn inference_parameters(&self) -> JsonValue {
        match self {
            MilvusIndex::Flat { metric } | MilvusIndex::BinFlat { metric } => {
                json!({ "metric_type": metric.wire_name() })
            }
            MilvusIndex::IvfFlat { nprobe, .. }
            | MilvusIndex::IvfSq8 { nprobe, .. }
            | MilvusIndex::IvfPq { nprobe, .. } => json!({ "nprobe": nprobe }),
            MilvusIndex::Hnsw { ef, .. } => json!({ "ef": ef }),
            MilvusIndex::BinIvfFlat { metric, nprobe, .. } => {
                json!({ "nprobe": nprobe, "metric_type": metric.wire_name() })
            }
        }
    }
}

fn resolve_metric(
    index_type: &'static str,
    family: MetricFamily,
    metric: Option<MilvusMetric>,
) -> Result<MilvusMetric, IndexError> {
    match metric {
        Some(metric) => {
            if metric.family() != family {
                return Err(IndexError::IncompatibleMetric {
                    index_type,
                    metric: metric.wire_name().to_string(),
                });
            }
            Ok(metric)
        }
        None => Ok(match family {
            MetricFamily::Floating => MilvusMetric::L2,
            MetricFamily::Binary => MilvusMetric::Jaccard,
        }),
    }
}

fn check_range(
    parameter: &'static str,
    min: u32,
    max: u32,
    value: u32,
) -> Result<(), IndexError> {
    if value < min || value > max {
        return Err(IndexError::ParameterOutOfRange {
            parameter,
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn check_cluster_units(
    cluster_units: u32,
    inference_comparison: Option<u32>,
) -> Result<(u32, u32), IndexError> {
    check_range("cluster_units", 1, 65536, cluster_units)?;
    if let Some(nprobe) = inference_comparison {
        if nprobe < 1 || nprobe > cluster_units {
            return Err(IndexError::InferenceComparisonOutOfRange {
                cluster_units,
                value: nprobe,
            });
        }
    }
    Ok((cluster_units, inference_comparison.unwrap_or(cluster_units)))
}
