// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! vector-orm: a typed schema and query layer over remote vector databases
//!
//! Declare a schema once (primary key, scalars, embeddings with index
//! configuration), then create, insert, and query through one fluent API
//! regardless of which backend serves the collection. The crate models,
//! validates, and translates requests; the actual search runs in the remote
//! engine behind the backend's client trait.

pub mod backends;
pub mod indexes;
pub mod query;
pub mod results;
pub mod schema;
pub mod session;

pub use backends::{
    BackendError, MilvusBackend, PineconeBackend, RemoteError, SearchRequest, SimilarityTarget,
    VectorBackend,
};
pub use indexes::{
    IndexError, MetricFamily, MilvusIndex, MilvusMetric, PineconeIndex, PineconeMetric,
    VectorIndex,
};
pub use query::expr::{CompareOp, Condition};
pub use query::{Query, QueryError};
pub use results::QueryResult;
pub use schema::{
    ConsistencyLevel, Entity, EntityBuilder, FieldDescriptor, FieldHandle, FieldKind, ScalarKind,
    SchemaBuilder, SchemaDescriptor, SchemaError, SchemaRef, Value, VectorElement,
};
pub use session::VectorSession;
