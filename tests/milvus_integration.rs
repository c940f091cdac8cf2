// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Session-level flows against the mock Milvus service.

mod common;

use std::sync::Arc;

use common::MockMilvus;
use vector_orm::{
    BackendError, ConsistencyLevel, Entity, FieldDescriptor, MilvusBackend, MilvusIndex,
    QueryError, ScalarKind, SchemaDescriptor, SchemaError, SchemaRef, Value, VectorSession,
};

fn my_object() -> SchemaRef {
    SchemaDescriptor::builder("my_collection")
        .consistency(ConsistencyLevel::Session)
        .field(FieldDescriptor::primary_key("id"))
        .field(FieldDescriptor::varchar("text", 128))
        .field(FieldDescriptor::float_embedding(
            "embedding",
            128,
            MilvusIndex::ivf_flat(128, None, None).unwrap(),
        ))
        .build()
        .unwrap()
}

fn binary_object() -> SchemaRef {
    SchemaDescriptor::builder("binary_collection")
        .field(FieldDescriptor::primary_key("id"))
        .field(FieldDescriptor::binary_embedding(
            "embedding",
            128,
            MilvusIndex::bin_flat(None).unwrap(),
        ))
        .build()
        .unwrap()
}

fn milvus_session() -> (VectorSession, Arc<MockMilvus>) {
    let client = Arc::new(MockMilvus::new());
    let session = VectorSession::new(Arc::new(MilvusBackend::new(client.clone())));
    (session, client)
}

fn row(schema: &SchemaRef, text: &str, fill: f32) -> Entity {
    Entity::builder(schema)
        .set("text", text)
        .set("embedding", vec![fill; 128])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_collection_provisions_indexes() {
    common::init_tracing();
    let (session, client) = milvus_session();
    let schema = my_object();

    session.create_collection(&schema).await.unwrap();

    let specs = client.index_specs("my_collection");
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].field_name, "embedding");
    assert_eq!(specs[0].index_type, "IVF_FLAT");
    assert_eq!(specs[0].metric_type, "L2");
    assert_eq!(specs[0].params, serde_json::json!({ "nlist": 128 }));
}

#[tokio::test]
async fn test_create_collection_requires_exactly_one_primary_key() {
    let (session, _) = milvus_session();

    let none = SchemaDescriptor::builder("no_primary")
        .field(FieldDescriptor::varchar("text", 16))
        .build()
        .unwrap();
    let err = session.create_collection(&none).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Schema(SchemaError::MissingPrimaryKey { .. })
    ));

    let two = SchemaDescriptor::builder("two_primaries")
        .field(FieldDescriptor::primary_key("a"))
        .field(FieldDescriptor::primary_key("b"))
        .build()
        .unwrap();
    let err = session.create_collection(&two).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Schema(SchemaError::MultiplePrimaryKeys { count: 2, .. })
    ));
}

#[tokio::test]
async fn test_incompatible_index_family_rejected() {
    let (session, _) = milvus_session();

    // A binary-only index cannot serve a floating embedding.
    let schema = SchemaDescriptor::builder("invalid_collection")
        .field(FieldDescriptor::primary_key("id"))
        .field(FieldDescriptor::float_embedding(
            "embedding",
            128,
            MilvusIndex::bin_ivf_flat(128, None, None).unwrap(),
        ))
        .build()
        .unwrap();
    let err = session.create_collection(&schema).await.unwrap_err();
    assert!(matches!(err, BackendError::IncompatibleIndex { .. }));

    // The matching pairing provisions fine.
    session.create_collection(&binary_object()).await.unwrap();
}

#[tokio::test]
async fn test_oversized_dimension_rejected() {
    let (session, _) = milvus_session();
    let schema = SchemaDescriptor::builder("too_wide")
        .field(FieldDescriptor::primary_key("id"))
        .field(FieldDescriptor::float_embedding(
            "embedding",
            40000,
            MilvusIndex::flat(None).unwrap(),
        ))
        .build()
        .unwrap();
    let err = session.create_collection(&schema).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::DimensionTooLarge { dim: 40000, .. }
    ));
}

#[tokio::test]
async fn test_insert_and_query_round_trip() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut entity = row(&schema, "example", 1.0);
    let key = session.insert(&mut entity).await.unwrap();
    assert_eq!(entity.primary_key().unwrap(), Some(key));

    session.flush(&schema).await.unwrap();
    session.load(&schema).await.unwrap();

    let results = session
        .query(&schema)
        .filter([schema.field("id").unwrap().eq(key)])
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.entity.primary_key().unwrap(), Some(key));
    assert_eq!(result.entity.get("text").unwrap().as_text(), Some("example"));
    // Scalar queries carry no similarity ranking.
    assert_eq!(result.score, None);
    assert_eq!(result.distance, None);
}

#[tokio::test]
async fn test_filtered_similarity_search() {
    let (session, client) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut foo = row(&schema, "foo", 1.0);
    let mut bar = row(&schema, "bar", 4.0);
    let mut baz = row(&schema, "baz", 7.0);
    session.insert(&mut foo).await.unwrap();
    session.insert(&mut bar).await.unwrap();
    session.insert(&mut baz).await.unwrap();

    session.flush(&schema).await.unwrap();
    session.load(&schema).await.unwrap();

    // Ranking toward foo's vector but filtering on bar's text must return
    // exactly bar.
    let results = session
        .query(&schema)
        .filter([schema.field("text").unwrap().eq("bar")])
        .order_by_similarity(&schema.field("embedding").unwrap(), vec![1.0f32; 128])
        .limit(2)
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].entity.primary_key().unwrap(),
        bar.primary_key().unwrap()
    );
    assert!(results[0].score.is_some());
    assert!(results[0].distance.is_some());

    // The schema's consistency level and the index's inference parameters
    // ride along on the wire call.
    let request = client.last_search().unwrap();
    assert_eq!(request.consistency_level.as_deref(), Some("Session"));
    assert_eq!(request.params, serde_json::json!({ "nprobe": 128 }));

    // Combined filters stay conjunctive.
    let results = session
        .query(&schema)
        .filter([
            schema.field("text").unwrap().eq("baz"),
            schema.field("id").unwrap().gt(1),
        ])
        .order_by_similarity(&schema.field("embedding").unwrap(), vec![8.0f32; 128])
        .limit(2)
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].entity.primary_key().unwrap(),
        baz.primary_key().unwrap()
    );
}

#[tokio::test]
async fn test_default_projection_excludes_embeddings() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut entity = row(&schema, "foo", 1.0);
    session.insert(&mut entity).await.unwrap();

    let results = session
        .query(&schema)
        .filter([schema.field("text").unwrap().eq("foo")])
        .limit(2)
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entity.get("embedding").unwrap(), &Value::Null);
}

#[tokio::test]
async fn test_embedding_projection_rejected() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    // Regular attributes can be projected explicitly.
    let results = session
        .query(&schema)
        .select([schema.field("text").unwrap()])
        .filter([schema.field("text").unwrap().eq("foo")])
        .all()
        .await
        .unwrap();
    assert!(results.is_empty());

    let err = session
        .query(&schema)
        .select([schema.field("embedding").unwrap()])
        .filter([schema.field("text").unwrap().eq("foo")])
        .all()
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::EmbeddingProjection { .. }));
}

#[tokio::test]
async fn test_delete_entity() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut entity = row(&schema, "example", 1.0);
    session.insert(&mut entity).await.unwrap();

    let results = session
        .query(&schema)
        .filter([schema.field("text").unwrap().eq("example")])
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    session.delete(&mut entity).await.unwrap();
    assert_eq!(entity.primary_key().unwrap(), None);

    let results = session
        .query(&schema)
        .filter([schema.field("text").unwrap().eq("example")])
        .all()
        .await
        .unwrap();
    assert!(results.is_empty());

    // Deleting again without a key is refused before any remote call.
    let err = session.delete(&mut entity).await.unwrap_err();
    assert!(matches!(err, BackendError::MissingPrimaryKeyValue { .. }));
}

#[tokio::test]
async fn test_delete_collection_is_idempotent() {
    let (session, _) = milvus_session();
    let schema = my_object();

    // Never created: still not an error.
    session.delete_collection(&schema).await.unwrap();

    session.create_collection(&schema).await.unwrap();
    session.delete_collection(&schema).await.unwrap();
    session.delete_collection(&schema).await.unwrap();
}

#[tokio::test]
async fn test_clear_collection_recreates() {
    let (session, client) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut entity = row(&schema, "example", 1.0);
    session.insert(&mut entity).await.unwrap();
    assert_eq!(client.row_count("my_collection"), 1);

    session.clear_collection(&schema).await.unwrap();
    assert_eq!(client.row_count("my_collection"), 0);
    assert_eq!(client.index_specs("my_collection").len(), 1);
}

#[tokio::test]
async fn test_batch_insert_preserves_input_order_across_schemas() {
    let (session, _) = milvus_session();
    let first = my_object();
    let second = SchemaDescriptor::builder("other_collection")
        .field(FieldDescriptor::primary_key("id"))
        .field(FieldDescriptor::scalar("rank", ScalarKind::Int64))
        .build()
        .unwrap();

    session.create_collection(&first).await.unwrap();
    session.create_collection(&second).await.unwrap();

    let mut entities = vec![
        row(&first, "a", 1.0),
        Entity::builder(&second).set("rank", 10i64).build().unwrap(),
        row(&first, "c", 3.0),
    ];

    let keys = session.insert_batch(&mut entities, false).await.unwrap();
    assert_eq!(keys.len(), 3);
    for (entity, key) in entities.iter().zip(&keys) {
        assert_eq!(entity.primary_key().unwrap(), Some(*key));
    }
    // Both `my_collection` rows went out in one call, in input order.
    assert!(keys[0] < keys[2]);
}

#[tokio::test]
async fn test_batch_insert_misalignment_aborts() {
    let (session, client) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let complete = row(&schema, "a", 1.0);
    // No text value: the text column would come up one short.
    let partial = Entity::builder(&schema)
        .set("embedding", vec![2.0f32; 128])
        .build()
        .unwrap();

    let mut entities = vec![complete, partial];
    let err = session.insert_batch(&mut entities, false).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::BatchMisaligned {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    // Nothing was inserted.
    assert_eq!(client.row_count("my_collection"), 0);
}

#[tokio::test]
async fn test_batch_insert_progress_unsupported() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let mut entities = vec![row(&schema, "a", 1.0)];
    let err = session.insert_batch(&mut entities, true).await.unwrap_err();
    assert!(matches!(err, BackendError::ProgressUnsupported { .. }));
}

#[tokio::test]
async fn test_binary_collection_query() {
    let (session, _) = milvus_session();
    let schema = binary_object();
    session.create_collection(&schema).await.unwrap();

    let mut ones = Entity::builder(&schema)
        .set("embedding", vec![true; 128])
        .build()
        .unwrap();
    let mut zeros = Entity::builder(&schema)
        .set("embedding", vec![false; 128])
        .build()
        .unwrap();
    session.insert(&mut ones).await.unwrap();
    session.insert(&mut zeros).await.unwrap();

    let results = session
        .query(&schema)
        .order_by_similarity(&schema.field("embedding").unwrap(), vec![true; 128])
        .limit(2)
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].entity.primary_key().unwrap(),
        ones.primary_key().unwrap()
    );

    let results = session
        .query(&schema)
        .order_by_similarity(&schema.field("embedding").unwrap(), vec![false; 128])
        .limit(2)
        .all()
        .await
        .unwrap();
    assert_eq!(
        results[0].entity.primary_key().unwrap(),
        zeros.primary_key().unwrap()
    );
}

#[tokio::test]
async fn test_fetch_window_capped() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    let err = session
        .query(&schema)
        .limit(16000)
        .offset(1000)
        .all()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Backend(BackendError::FetchTooLarge { max: 16384, .. })
    ));
}

#[tokio::test]
async fn test_scalar_query_respects_offset() {
    let (session, _) = milvus_session();
    let schema = my_object();
    session.create_collection(&schema).await.unwrap();

    for text in ["a", "b", "c"] {
        let mut entity = row(&schema, text, 1.0);
        session.insert(&mut entity).await.unwrap();
    }

    let results = session
        .query(&schema)
        .offset(1)
        .limit(10)
        .all()
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}
