use super::*;
use crate::config::{AppConfig, ConfigLoader, ConfigManager, RetrievalConfig, SearchMode};
use crate::providers::{Embedder, MockEmbedder};
use crate::registry::ModelRegistry;
use crate::vectorstore::{InMemoryVectorStore, VectorRecord, VectorStore};
use serde_json::Map;
use uuid::Uuid;

struct Fixture {
    _dir: tempfile::TempDir,
    engine: RetrievalEngine,
    store: Arc<InMemoryVectorStore>,
}

async fn fixture_with(config_edit: impl FnOnce(&mut AppConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    let mut app_config = AppConfig::default();
    config_edit(&mut app_config);
    loader.save(&app_config).unwrap();
    let config = Arc::new(ConfigManager::from_loader(loader).unwrap());

    let store = Arc::new(InMemoryVectorStore::new("test"));
    let registry = Arc::new(ModelRegistry::from_config(config).unwrap());
    registry.initialize().await;

    Fixture {
        _dir: dir,
        engine: RetrievalEngine::new(store.clone(), registry),
        store,
    }
}

async fn fixture() -> Fixture {
    fixture_with(|_| {}).await
}

async fn seed(store: &InMemoryVectorStore, entries: &[(&str, Option<&str>)]) {
    let probe = MockEmbedder::new("probe");
    probe.initialize().await.unwrap();

    let mut records = Vec::new();
    for (content, embed_as) in entries {
        let embedding = probe
            .embed_query(embed_as.unwrap_or(content))
            .await
            .unwrap();
        let mut metadata = Map::new();
        metadata.insert(
            "document_name".to_string(),
            serde_json::Value::String("seed.txt".to_string()),
        );
        records.push(VectorRecord {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: content.to_string(),
            embedding,
            metadata,
        });
    }
    store.add_vectors(records).await.unwrap();
}

fn config(mode: SearchMode) -> RetrievalConfig {
    RetrievalConfig {
        top_k: 5,
        similarity_threshold: 0.0,
        search_mode: mode,
        enable_rerank: false,
        enable_cache: false,
        hybrid_alpha: 0.7,
    }
}

#[tokio::test]
async fn semantic_search_orders_by_similarity() {
    let fx = fixture().await;
    seed(
        &fx.store,
        &[
            ("neural networks", None),
            ("the weather today", None),
            ("machine learning uses neural networks", None),
        ],
    )
    .await;

    let results = fx
        .engine
        .search_with_config("neural networks", &config(SearchMode::Semantic))
        .await
        .unwrap();

    assert_eq!(results[0].content, "neural networks");
    for window in results.windows(2) {
        assert!(window[0].similarity_score >= window[1].similarity_score);
    }
    for result in &results {
        assert!((0.0..=1.0).contains(&result.similarity_score));
    }

    assert_eq!(fx.engine.stats().semantic_searches, 1);
}

#[tokio::test]
async fn keyword_mode_replaces_scores_with_lexical_signal() {
    let fx = fixture().await;
    seed(
        &fx.store,
        &[
            ("neural networks", None),
            ("the weather today", None),
            ("machine learning uses neural networks", None),
        ],
    )
    .await;

    let results = fx
        .engine
        .search_with_config("neural networks", &config(SearchMode::Keyword))
        .await
        .unwrap();

    // Both token-complete candidates sit at the top with full lexical
    // scores; the unrelated one is last with zero.
    assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
    assert!((results[1].similarity_score - 1.0).abs() < 1e-6);
    assert_eq!(results[2].content, "the weather today");
    assert_eq!(results[2].similarity_score, 0.0);
    assert_eq!(fx.engine.stats().keyword_searches, 1);
}

#[tokio::test]
async fn hybrid_mode_blends_semantic_and_lexical() {
    let fx = fixture().await;
    // "cooking pasta" is embedded as if it were the query itself, giving
    // it a perfect semantic score but zero lexical overlap. The genuine
    // match wins only because the blend credits its lexical signal.
    seed(
        &fx.store,
        &[
            ("a recipe for cooking pasta", Some("neural networks")),
            ("neural networks guide", None),
        ],
    )
    .await;

    let semantic = fx
        .engine
        .search_with_config("neural networks", &config(SearchMode::Semantic))
        .await
        .unwrap();
    assert_eq!(semantic[0].content, "a recipe for cooking pasta");

    let hybrid = fx
        .engine
        .search_with_config("neural networks", &config(SearchMode::Hybrid))
        .await
        .unwrap();
    assert_eq!(hybrid[0].content, "neural networks guide");

    // Blend arithmetic: alpha * semantic + (1 - alpha) * lexical.
    let imposter = hybrid
        .iter()
        .find(|r| r.content.contains("pasta"))
        .unwrap();
    assert!((imposter.similarity_score - 0.7).abs() < 1e-3);
}

#[tokio::test]
async fn top_k_zero_returns_empty_without_touching_anything() {
    let fx = fixture().await;
    let mut cfg = config(SearchMode::Semantic);
    cfg.top_k = 0;

    let results = fx.engine.search_with_config("anything", &cfg).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(fx.engine.stats().total_searches, 0);
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let fx = fixture().await;
    assert!(matches!(
        fx.engine
            .search_with_config("  ", &config(SearchMode::Semantic))
            .await
            .unwrap_err(),
        RetrievalError::EmptyQuery
    ));
}

#[tokio::test]
async fn threshold_filters_weak_matches() {
    let fx = fixture().await;
    seed(
        &fx.store,
        &[("neural networks", None), ("totally unrelated prose", None)],
    )
    .await;

    let mut cfg = config(SearchMode::Semantic);
    cfg.similarity_threshold = 0.9;
    let results = fx
        .engine
        .search_with_config("neural networks", &cfg)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "neural networks");
}

#[tokio::test]
async fn rerank_attaches_scores_and_reorders() {
    let fx = fixture().await;
    // Embedded as unrelated text, the relevant answer starts at the bottom
    // of the semantic ordering; the (mock) cross-encoder pulls it up.
    seed(
        &fx.store,
        &[
            ("rust ownership and borrowing rules", Some("unrelated alpha")),
            ("the garbage collector pauses", Some("rust ownership and borrowing rules")),
        ],
    )
    .await;

    let mut cfg = config(SearchMode::Semantic);
    cfg.enable_rerank = true;
    let results = fx
        .engine
        .search_with_config("rust ownership and borrowing rules", &cfg)
        .await
        .unwrap();

    assert_eq!(results[0].content, "rust ownership and borrowing rules");
    assert!(results.iter().all(|r| r.rerank_score().is_some()));
    for window in results.windows(2) {
        assert!(window[0].rerank_score() >= window[1].rerank_score());
    }

    let stats = fx.engine.stats();
    assert_eq!(stats.rerank_invocations, 1);
    assert_eq!(stats.rerank_failures, 0);
}

#[tokio::test]
async fn unreachable_reranker_degrades_instead_of_failing() {
    let fx = fixture_with(|app| {
        app.reranking.provider = "siliconflow".to_string();
        app.reranking.api_key = Some("sk-test".to_string());
        app.reranking.base_url = Some("http://127.0.0.1:9".to_string());
        app.reranking.retry_attempts = 0;
        app.reranking.timeout_secs = 2;
        app.reranking.enable_fallback = false;
    })
    .await;
    seed(&fx.store, &[("neural networks", None)]).await;

    let mut cfg = config(SearchMode::Semantic);
    cfg.enable_rerank = true;
    let results = fx
        .engine
        .search_with_config("neural networks", &cfg)
        .await
        .unwrap();

    // Results still come back, without rerank scores.
    assert_eq!(results.len(), 1);
    assert!(results[0].rerank_score().is_none());
    assert_eq!(fx.engine.stats().rerank_failures, 1);
}

#[tokio::test]
async fn cache_serves_repeat_queries() {
    let fx = fixture().await;
    seed(&fx.store, &[("neural networks", None)]).await;

    let mut cfg = config(SearchMode::Semantic);
    cfg.enable_cache = true;

    let first = fx
        .engine
        .search_with_config("neural networks", &cfg)
        .await
        .unwrap();
    let second = fx
        .engine
        .search_with_config("neural networks", &cfg)
        .await
        .unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(fx.engine.stats().cache_hits, 1);
    // Only the first search reached the store and counters.
    assert_eq!(fx.engine.stats().total_searches, 1);
}
