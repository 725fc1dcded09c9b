use super::*;
use crate::config::{AppConfig, ConfigLoader, ConfigManager};
use crate::ingest::IngestPipeline;
use crate::registry::ModelRegistry;
use crate::storage::Database;
use crate::vectorstore::InMemoryVectorStore;
use std::io::Write;

struct Fixture {
    _dir: tempfile::TempDir,
    qa: QaService,
    pipeline: IngestPipeline,
    db: Arc<Database>,
}

async fn fixture_with(config_edit: impl FnOnce(&mut AppConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    let mut app_config = AppConfig::default();
    // The deterministic mock embedder yields modest cosine scores for
    // short queries against longer chunks; keep the gate permissive.
    app_config.retrieval.similarity_threshold = 0.1;
    config_edit(&mut app_config);
    loader.save(&app_config).unwrap();
    let config = Arc::new(ConfigManager::from_loader(loader).unwrap());

    let db = Arc::new(Database::in_memory().await.unwrap());
    let store = Arc::new(InMemoryVectorStore::new("test"));
    let registry = Arc::new(ModelRegistry::from_config(Arc::clone(&config)).unwrap());
    registry.initialize().await;

    let retrieval = Arc::new(RetrievalEngine::new(store.clone(), Arc::clone(&registry)));
    let pipeline = IngestPipeline::new(
        Arc::clone(&config),
        Arc::clone(&db),
        store,
        Arc::clone(&registry),
    );
    let qa = QaService::new(config, Arc::clone(&db), retrieval, registry);

    Fixture {
        _dir: dir,
        qa,
        pipeline,
        db,
    }
}

async fn fixture() -> Fixture {
    fixture_with(|_| {}).await
}

async fn index_facts(fx: &Fixture) {
    let content = "Python was created by Guido van Rossum in 1991.\n\n\
                   Machine learning is a subset of AI.";
    let path = fx._dir.path().join("facts.txt");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();

    let document = fx
        .pipeline
        .register_upload("facts.txt", "text/plain", content.len() as u64)
        .await
        .unwrap();
    fx.pipeline
        .process_document(document.id, &path)
        .await
        .unwrap();
}

#[tokio::test]
async fn answers_from_indexed_sources_with_attribution() {
    let fx = fixture().await;
    index_facts(&fx).await;

    let response = fx
        .qa
        .answer_question("Who created Python?", None, None)
        .await
        .unwrap();

    assert!(
        response.answer.contains("Guido van Rossum"),
        "unexpected answer: {}",
        response.answer
    );
    assert!(!response.sources.is_empty());
    assert_eq!(response.sources[0].document_name, "facts.txt");
    assert!((0.0..=1.0).contains(&response.confidence_score));
    assert!(response.confidence_score > 0.2);
    assert!(response.sources[0].content_preview.chars().count() <= 200);
}

#[tokio::test]
async fn sessions_continue_across_turns() {
    let fx = fixture().await;
    index_facts(&fx).await;

    let first = fx
        .qa
        .answer_question("Who created Python?", None, None)
        .await
        .unwrap();
    let session_id = first.session_id;

    let second = fx
        .qa
        .answer_question("What is machine learning?", Some(session_id), None)
        .await
        .unwrap();
    assert_eq!(second.session_id, session_id);

    let history = fx.db.get_session_history(session_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].question, "Who created Python?");
    assert_eq!(history[1].question, "What is machine learning?");

    let session = fx.db.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(session.qa_count, 2);
}

#[tokio::test]
async fn empty_retrieval_yields_the_no_context_answer() {
    let fx = fixture().await;

    let response = fx
        .qa
        .answer_question("Anything indexed?", None, None)
        .await
        .unwrap();

    assert_eq!(response.answer, NO_CONTEXT_ANSWER);
    assert_eq!(response.confidence_score, 0.0);
    assert!(response.sources.is_empty());

    // The turn is still persisted.
    let history = fx.db.get_session_history(response.session_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn generation_failure_degrades_with_sources_attached() {
    let fx = fixture_with(|app| {
        app.llm.provider = "siliconflow".to_string();
        app.llm.api_key = Some("sk-test".to_string());
        app.llm.base_url = Some("http://127.0.0.1:9".to_string());
        app.llm.retry_attempts = 0;
        app.llm.timeout_secs = 2;
    })
    .await;
    index_facts(&fx).await;

    let response = fx
        .qa
        .answer_question("Who created Python?", None, None)
        .await
        .unwrap();

    assert_eq!(response.answer, DEGRADED_ANSWER);
    assert_eq!(response.confidence_score, 0.0);
    assert!(!response.sources.is_empty(), "sources ride along on degradation");

    let history = fx.db.get_session_history(response.session_id).await.unwrap();
    assert_eq!(history[0].answer, DEGRADED_ANSWER);
}

#[tokio::test]
async fn reranked_sources_carry_their_scores() {
    let fx = fixture_with(|app| {
        app.retrieval.enable_rerank = true;
        app.retrieval.similarity_threshold = 0.1;
    })
    .await;
    index_facts(&fx).await;

    let response = fx
        .qa
        .answer_question("Who created Python?", None, None)
        .await
        .unwrap();

    assert!(response.sources.iter().all(|s| s.rerank_score.is_some()));
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let fx = fixture().await;
    assert!(matches!(
        fx.qa.answer_question("  ", None, None).await.unwrap_err(),
        QaError::EmptyQuestion
    ));
    // Nothing was persisted.
    assert_eq!(fx.db.stats_summary().await.unwrap().total_sessions, 0);
}

#[tokio::test]
async fn unknown_session_surfaces_a_storage_error() {
    let fx = fixture().await;
    index_facts(&fx).await;

    let err = fx
        .qa
        .answer_question("Who created Python?", Some(Uuid::new_v4()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::Storage(_)));
}
