// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Session façade over a vector database backend.

use std::sync::Arc;

use crate::backends::{BackendError, VectorBackend};
use crate::query::Query;
use crate::schema::{Entity, SchemaRef};

/// Core session object used to interact with a vector database backend.
///
/// Sessions forward every operation to the active backend and keep entity
/// primary keys in sync around inserts and deletes.
#[derive(Clone)]
pub struct VectorSession {
    backend: Arc<dyn VectorBackend>,
}

impl VectorSession {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Start a chainable query against a schema.
    pub fn query(&self, schema: &SchemaRef) -> Query {
        Query::new(Arc::clone(&self.backend), SchemaRef::clone(schema))
    }

    pub async fn create_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.backend.create_collection(schema).await
    }

    pub async fn clear_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.backend.clear_collection(schema).await
    }

    pub async fn delete_collection(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.backend.delete_collection(schema).await
    }

    /// Insert one entity and assign the backend-provided primary key onto
    /// it.
    pub async fn insert(&self, entity: &mut Entity) -> Result<i64, BackendError> {
        let key = self.backend.insert(entity).await?;
        entity.set_primary_key(Some(key))?;
        Ok(key)
    }

    /// Insert a batch, possibly mixing schemas, and assign the returned keys
    /// in input order.
    pub async fn insert_batch(
        &self,
        entities: &mut [Entity],
        show_progress: bool,
    ) -> Result<Vec<i64>, BackendError> {
        let keys = self.backend.insert_batch(entities, show_progress).await?;
        for (entity, key) in entities.iter_mut().zip(&keys) {
            entity.set_primary_key(Some(*key))?;
        }
        Ok(keys)
    }

    /// Delete an inserted entity and clear its primary key.
    pub async fn delete(&self, entity: &mut Entity) -> Result<(), BackendError> {
        if entity.primary_key()?.is_none() {
            return Err(BackendError::MissingPrimaryKeyValue {
                collection: entity.schema().collection_name().to_string(),
            });
        }
        self.backend.delete(entity).await?;
        entity.set_primary_key(None)?;
        Ok(())
    }

    pub async fn flush(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.backend.flush(schema).await
    }

    pub async fn load(&self, schema: &SchemaRef) -> Result<(), BackendError> {
        self.backend.load(schema).await
    }
}
