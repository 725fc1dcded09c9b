use super::*;
use crate::config::{EmbeddingsConfig, LlmConfig, RerankingConfig};
use std::sync::atomic::{AtomicU32, Ordering};

#[tokio::test]
async fn mock_embedder_is_deterministic_and_normalized() {
    let embedder = MockEmbedder::new("test-model");
    embedder.initialize().await.unwrap();

    let a = embedder.embed_query("neural networks").await.unwrap();
    let b = embedder.embed_query("neural networks").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), mock::MOCK_EMBEDDING_DIM);

    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn mock_embedder_correlates_shared_vocabulary() {
    let embedder = MockEmbedder::new("test-model");
    embedder.initialize().await.unwrap();

    let query = embedder.embed_query("who created python").await.unwrap();
    let related = embedder
        .embed_query("Python was created by Guido van Rossum in 1991")
        .await
        .unwrap();
    let unrelated = embedder
        .embed_query("machine learning is a subset of AI")
        .await
        .unwrap();

    let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
    assert!(dot(&query, &related) > dot(&query, &unrelated));
}

#[tokio::test]
async fn operations_fail_fast_before_initialize() {
    let embedder = MockEmbedder::new("test-model");
    let err = embedder.embed_query("hello").await.unwrap_err();
    assert!(matches!(err, ModelError::NotInitialized { .. }));
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let embedder = MockEmbedder::new("test-model");
    embedder.initialize().await.unwrap();
    assert!(matches!(
        embedder.embed_query("   ").await.unwrap_err(),
        ModelError::EmptyInput { .. }
    ));

    let reranker = MockReranker::new("test-reranker");
    reranker.initialize().await.unwrap();
    assert!(matches!(
        reranker.rerank("", &["doc".to_string()]).await.unwrap_err(),
        ModelError::EmptyInput { .. }
    ));
}

#[tokio::test]
async fn rerank_of_empty_documents_skips_the_backend() {
    let reranker = MockReranker::new("test-reranker");
    reranker.initialize().await.unwrap();
    reranker.fail_requests(true);

    // Would fail if the backend were invoked.
    let scores = reranker.rerank("query", &[]).await.unwrap();
    assert!(scores.is_empty());
    assert_eq!(reranker.metrics().total_requests, 0);
}

#[tokio::test]
async fn rerank_batch_rejects_mismatched_lengths() {
    let reranker = MockReranker::new("test-reranker");
    reranker.initialize().await.unwrap();

    let err = reranker
        .rerank_batch(&["a".to_string()], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidInput { .. }));
}

#[tokio::test]
async fn reranker_scores_align_with_input_order() {
    let reranker = MockReranker::new("test-reranker");
    reranker.initialize().await.unwrap();

    let docs = vec![
        "the weather today".to_string(),
        "neural networks for vision".to_string(),
    ];
    let scores = reranker.rerank("neural networks", &docs).await.unwrap();
    assert_eq!(scores.len(), 2);
    assert!(scores[1] > scores[0]);
}

#[tokio::test]
async fn initialize_is_idempotent_and_failure_is_sticky() {
    let attempts = AtomicU32::new(0);
    let cell = LifecycleCell::new();

    // First call fails; the attempt count must not grow on re-entry.
    let result = cell
        .initialize(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ModelError::InvalidConfig {
                message: "boom".to_string(),
            })
        })
        .await;
    assert!(result.is_err());
    assert_eq!(cell.state(), ModelState::Error);

    let second = cell
        .initialize(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert!(matches!(
        second.unwrap_err(),
        ModelError::InitializationFailed { .. }
    ));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Cleanup clears the sticky error.
    cell.reset().await;
    cell.initialize(|| async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(cell.state(), ModelState::Loaded);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_initialize_runs_once() {
    use std::sync::Arc;

    let embedder = Arc::new(MockEmbedder::new("test-model"));
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let embedder = Arc::clone(&embedder);
            tokio::spawn(async move { embedder.initialize().await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert!(embedder.health_check().await.model_loaded);
}

#[tokio::test]
async fn cleanup_twice_is_a_noop() {
    let embedder = MockEmbedder::new("test-model");
    embedder.initialize().await.unwrap();
    embedder.cleanup().await.unwrap();
    embedder.cleanup().await.unwrap();

    // Back to unloaded: operations require re-initialization.
    assert!(matches!(
        embedder.embed_query("x").await.unwrap_err(),
        ModelError::NotInitialized { .. }
    ));
}

#[tokio::test]
async fn metrics_track_successes_and_failures() {
    let embedder = MockEmbedder::new("test-model");
    embedder.initialize().await.unwrap();

    embedder.embed_query("one").await.unwrap();
    embedder
        .embed_batch(&["two".to_string(), "three".to_string()])
        .await
        .unwrap();

    embedder.fail_requests(true);
    assert!(embedder.embed_query("four").await.is_err());

    let snapshot = embedder.metrics();
    assert_eq!(snapshot.total_requests, 3);
    assert_eq!(snapshot.successful_requests, 2);
    assert_eq!(snapshot.failed_requests, 1);
    assert_eq!(snapshot.total_units, 3);
    assert!((snapshot.success_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn mock_generator_extracts_matching_sentence() {
    let generator = MockGenerator::new("test-llm");
    generator.initialize().await.unwrap();

    let output = generator
        .generate(GenerationRequest {
            system: None,
            prompt: "Who created Python? \
                     Python was created by Guido van Rossum in 1991. \
                     Machine learning is a subset of AI."
                .to_string(),
            temperature: 0.0,
            max_tokens: 100,
        })
        .await
        .unwrap();

    assert!(output.text.contains("Guido van Rossum"));
}

#[tokio::test]
async fn mock_generator_admits_when_context_is_unrelated() {
    let generator = MockGenerator::new("test-llm");
    generator.initialize().await.unwrap();

    let output = generator
        .generate(GenerationRequest {
            system: None,
            prompt: "Zebras? Quantum chromodynamics binds quarks.".to_string(),
            temperature: 0.0,
            max_tokens: 100,
        })
        .await
        .unwrap();

    assert_eq!(output.text, mock::MOCK_NO_ANSWER);
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
    assert_eq!(truncate_chars("短文本测试", 2), "短文");
    assert_eq!(truncate_chars("short", 100), "short");
}

#[test]
fn factory_builds_mock_providers() {
    let factory = ProviderFactory::new();

    let embedder = factory.create_embedder(&EmbeddingsConfig::default()).unwrap();
    assert_eq!(embedder.provider_name(), "mock");

    let generator = factory.create_generator(&LlmConfig::default()).unwrap();
    assert_eq!(generator.provider_name(), "mock");
}

#[test]
fn factory_rejects_unknown_provider() {
    let factory = ProviderFactory::new();
    let mut config = EmbeddingsConfig::default();
    config.provider = "quantum".to_string();

    let err = factory.create_embedder(&config).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedProvider { provider, .. } if provider == "quantum"));
}

#[test]
fn openai_reranking_fails_closed() {
    let factory = ProviderFactory::new();
    let mut config = RerankingConfig::default();
    config.provider = "openai".to_string();
    config.api_key = Some("sk-test".to_string());

    let err = factory.create_reranker(&config).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedProvider { .. }));
}

#[test]
fn provider_is_inferred_from_base_url() {
    let detected = factory::resolve_provider(
        "",
        Some("sk-test"),
        Some("https://api.siliconflow.cn/v1"),
    );
    assert_eq!(detected, "siliconflow");

    let detected =
        factory::resolve_provider("", Some("sk-test"), Some("https://api.openai.com/v1"));
    assert_eq!(detected, "openai");

    // No credentials: local provider.
    assert_eq!(factory::resolve_provider("", None, None), "local");

    // Explicit names always win.
    assert_eq!(
        factory::resolve_provider("mock", Some("k"), Some("https://api.openai.com")),
        "mock"
    );
}

#[test]
fn fallback_pair_is_built_when_enabled() {
    let factory = ProviderFactory::new();
    let mut config = RerankingConfig::default();
    config.provider = "siliconflow".to_string();
    config.api_key = Some("sk-test".to_string());
    config.enable_fallback = true;
    config.fallback_provider = "mock".to_string();

    let (primary, fallback) = factory.create_reranker_with_fallback(&config).unwrap();
    assert_eq!(primary.provider_name(), "siliconflow");
    assert_eq!(fallback.unwrap().provider_name(), "mock");
}

#[tokio::test]
async fn local_providers_fall_back_to_stub_mode() {
    let mut config = EmbeddingsConfig::default();
    config.provider = "local".to_string();
    config.model = "/nonexistent/model-dir".to_string();
    config.dimensions = Some(128);

    let embedder = local::LocalEmbedder::from_config(&config);
    embedder.initialize().await.unwrap();

    let vector = embedder.embed_query("stub me").await.unwrap();
    assert_eq!(vector.len(), 128);

    let report = embedder.health_check().await;
    assert_eq!(report.status, HealthStatus::Degraded);
}
