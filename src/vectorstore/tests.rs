use super::*;
use serde_json::Map;
use uuid::Uuid;

fn record(document_id: Uuid, embedding: Vec<f32>, content: &str) -> VectorRecord {
    let mut metadata = Map::new();
    metadata.insert(
        META_DOCUMENT_NAME.to_string(),
        serde_json::Value::String("test.txt".to_string()),
    );
    VectorRecord {
        chunk_id: Uuid::new_v4(),
        document_id,
        content: content.to_string(),
        embedding,
        metadata,
    }
}

#[tokio::test]
async fn first_insert_establishes_the_dimension() {
    let store = InMemoryVectorStore::new("test");
    store.initialize().await.unwrap();
    let doc = Uuid::new_v4();

    store
        .add_vectors(vec![record(doc, vec![0.0; 1024], "a")])
        .await
        .unwrap();

    let info = store.collection_info().await.unwrap();
    assert_eq!(info.dimension, Some(1024));
    assert_eq!(info.count, 1);
}

#[tokio::test]
async fn mismatched_dimension_is_rejected_without_partial_state() {
    let store = InMemoryVectorStore::new("test");
    let doc = Uuid::new_v4();

    store
        .add_vectors(vec![record(doc, vec![0.5; 1024], "a")])
        .await
        .unwrap();

    // A batch with one good and one bad record must insert neither.
    let err = store
        .add_vectors(vec![
            record(doc, vec![0.5; 1024], "b"),
            record(doc, vec![0.5; 768], "c"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VectorStoreError::DimensionMismatch {
            expected: 1024,
            actual: 768,
            ..
        }
    ));

    let info = store.collection_info().await.unwrap();
    assert_eq!(info.count, 1);
    assert_eq!(info.dimension, Some(1024));
}

#[tokio::test]
async fn empty_embedding_is_rejected() {
    let store = InMemoryVectorStore::new("test");
    let err = store
        .add_vectors(vec![record(Uuid::new_v4(), vec![], "a")])
        .await
        .unwrap_err();
    assert!(matches!(err, VectorStoreError::EmptyEmbedding { .. }));
}

#[tokio::test]
async fn search_orders_by_score_and_applies_threshold() {
    let store = InMemoryVectorStore::new("test");
    let doc = Uuid::new_v4();

    store
        .add_vectors(vec![
            record(doc, vec![1.0, 0.0, 0.0], "exact"),
            record(doc, vec![0.8, 0.6, 0.0], "close"),
            record(doc, vec![0.0, 1.0, 0.0], "orthogonal"),
        ])
        .await
        .unwrap();

    let results = store
        .search_similar(&[1.0, 0.0, 0.0], 10, 0.5, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "exact");
    assert_eq!(results[1].content, "close");
    for window in results.windows(2) {
        assert!(window[0].similarity_score >= window[1].similarity_score);
    }
    for result in &results {
        assert!((0.0..=1.0).contains(&result.similarity_score));
        assert_eq!(result.document_name(), Some("test.txt"));
    }
}

#[tokio::test]
async fn search_with_zero_top_k_skips_the_index() {
    let store = InMemoryVectorStore::new("test");
    store
        .add_vectors(vec![record(Uuid::new_v4(), vec![1.0, 0.0], "a")])
        .await
        .unwrap();

    // Query dimension doesn't even match; the index must not be consulted.
    let results = store.search_similar(&[], 0, 0.0, None).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn document_filter_restricts_hits() {
    let store = InMemoryVectorStore::new("test");
    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();

    store
        .add_vectors(vec![
            record(doc_a, vec![1.0, 0.0], "from a"),
            record(doc_b, vec![1.0, 0.0], "from b"),
        ])
        .await
        .unwrap();

    let results = store
        .search_similar(&[1.0, 0.0], 10, 0.0, Some(SearchFilter::for_document(doc_a)))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, doc_a);
}

#[tokio::test]
async fn delete_by_document_is_idempotent() {
    let store = InMemoryVectorStore::new("test");
    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();

    store
        .add_vectors(vec![
            record(doc_a, vec![1.0, 0.0], "a1"),
            record(doc_a, vec![0.0, 1.0], "a2"),
            record(doc_b, vec![1.0, 1.0], "b1"),
        ])
        .await
        .unwrap();

    store.delete_by_document(doc_a).await.unwrap();
    assert_eq!(store.len(), 1);

    // Deleting again (or deleting the unknown) is a no-op.
    store.delete_by_document(doc_a).await.unwrap();
    store.delete_by_document(Uuid::new_v4()).await.unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn cosine_similarity_handles_degenerate_inputs() {
    use super::memory::cosine_similarity;

    assert_eq!(cosine_similarity(&[], &[]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
}

#[test]
fn scores_are_clamped_into_unit_range() {
    assert_eq!(clamp_score(-0.2), 0.0);
    assert_eq!(clamp_score(0.5), 0.5);
    assert_eq!(clamp_score(1.2), 1.0);
}
