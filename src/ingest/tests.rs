use super::*;
use crate::config::{AppConfig, ConfigLoader, ConfigManager};
use crate::providers::Embedder;
use crate::registry::ModelRegistry;
use crate::storage::{Database, DocumentStatus};
use crate::vectorstore::{InMemoryVectorStore, VectorRecord, VectorStore};
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    _dir: tempfile::TempDir,
    pipeline: IngestPipeline,
    vectors: Arc<InMemoryVectorStore>,
    db: Arc<Database>,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    loader.save(&AppConfig::default()).unwrap();
    let config = Arc::new(ConfigManager::from_loader(loader).unwrap());

    let db = Arc::new(Database::in_memory().await.unwrap());
    let vectors = Arc::new(InMemoryVectorStore::new("test"));
    let registry = Arc::new(ModelRegistry::from_config(Arc::clone(&config)).unwrap());
    registry.initialize().await;

    let pipeline = IngestPipeline::new(
        config,
        Arc::clone(&db),
        vectors.clone(),
        registry,
    );

    Fixture {
        _dir: dir,
        pipeline,
        vectors,
        db,
    }
}

fn write_upload(fixture: &Fixture, name: &str, content: &str) -> std::path::PathBuf {
    let path = fixture._dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn upload_to_ready_produces_consistent_counts() {
    let fx = fixture().await;
    let content = "Python was created by Guido van Rossum in 1991.\n\n\
                   Machine learning is a subset of AI.";
    let path = write_upload(&fx, "facts.txt", content);

    let document = fx
        .pipeline
        .register_upload("facts.txt", "text/plain", content.len() as u64)
        .await
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Pending);

    let ready = fx
        .pipeline
        .process_document(document.id, &path)
        .await
        .unwrap();

    assert_eq!(ready.status, DocumentStatus::Ready);
    assert!(ready.chunk_count >= 1);
    assert_eq!(ready.vector_count, ready.chunk_count);
    // The stored vector count matches the record's counters.
    assert_eq!(fx.vectors.len() as u32, ready.chunk_count);

    let probe = crate::providers::MockEmbedder::new("probe");
    probe.initialize().await.unwrap();
    let query = probe.embed_query("who created python").await.unwrap();

    let hits = fx
        .vectors
        .search_similar(&query, 5, 0.0, None)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].document_name(), Some("facts.txt"));
    assert_eq!(
        hits[0]
            .metadata
            .get("embedding_provider")
            .and_then(|v| v.as_str()),
        Some("mock")
    );
}

#[tokio::test]
async fn empty_upload_is_rejected_before_any_record() {
    let fx = fixture().await;
    let err = fx
        .pipeline
        .register_upload("empty.txt", "text/plain", 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Document(DocumentError::EmptyDocument)
    ));
    assert_eq!(fx.db.document_overview().await.unwrap().total_count, 0);
}

#[tokio::test]
async fn pipeline_failure_rolls_back_vectors_and_marks_error() {
    let fx = fixture().await;

    // Establish a conflicting collection dimension so the insert fails
    // partway through the pipeline.
    fx.vectors
        .add_vectors(vec![VectorRecord {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: "seed".to_string(),
            embedding: vec![0.0; 8],
            metadata: serde_json::Map::new(),
        }])
        .await
        .unwrap();

    let content = "Some perfectly reasonable document content for the test.";
    let path = write_upload(&fx, "doomed.txt", content);
    let document = fx
        .pipeline
        .register_upload("doomed.txt", "text/plain", content.len() as u64)
        .await
        .unwrap();

    let err = fx
        .pipeline
        .process_document(document.id, &path)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::VectorStore(_)));

    let failed = fx.db.get_document(document.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DocumentStatus::Error);
    assert!(failed.error_message.is_some());
    assert_eq!(failed.chunk_count, 0);

    // Only the seed vector remains; the document's vectors were removed.
    assert_eq!(fx.vectors.len(), 1);
}

#[tokio::test]
async fn unsupported_format_fails_the_document() {
    let fx = fixture().await;
    let path = write_upload(&fx, "table.csv", "a,b\n1,2\n");
    let document = fx
        .pipeline
        .register_upload("table.csv", "text/csv", 8)
        .await
        .unwrap();

    let err = fx
        .pipeline
        .process_document(document.id, &path)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Document(DocumentError::UnsupportedFormat { .. })
    ));

    let failed = fx.db.get_document(document.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DocumentStatus::Error);
}

#[tokio::test]
async fn reprocess_clears_and_rebuilds_vectors() {
    let fx = fixture().await;
    let content = "First fact about compilers.\n\nSecond fact about interpreters.";
    let path = write_upload(&fx, "redo.txt", content);
    let document = fx
        .pipeline
        .register_upload("redo.txt", "text/plain", content.len() as u64)
        .await
        .unwrap();

    let first = fx
        .pipeline
        .process_document(document.id, &path)
        .await
        .unwrap();
    let count_after_first = fx.vectors.len();
    assert_eq!(count_after_first as u32, first.chunk_count);

    let second = fx
        .pipeline
        .reprocess_document(document.id, &path)
        .await
        .unwrap();
    assert_eq!(second.status, DocumentStatus::Ready);
    // Rebuilt, not accumulated.
    assert_eq!(fx.vectors.len() as u32, second.chunk_count);
}

#[tokio::test]
async fn delete_document_removes_record_and_vectors() {
    let fx = fixture().await;
    let content = "A document destined for deletion after indexing completes.";
    let path = write_upload(&fx, "gone.txt", content);
    let document = fx
        .pipeline
        .register_upload("gone.txt", "text/plain", content.len() as u64)
        .await
        .unwrap();
    fx.pipeline
        .process_document(document.id, &path)
        .await
        .unwrap();
    assert!(fx.vectors.len() > 0);

    assert!(fx.pipeline.delete_document(document.id).await.unwrap());
    assert_eq!(fx.vectors.len(), 0);
    assert!(fx.db.get_document(document.id).await.unwrap().is_none());

    // Deleting again reports absence.
    assert!(!fx.pipeline.delete_document(document.id).await.unwrap());
}
