use super::*;
use crate::config::{AppConfig, ConfigLoader, ConfigManager};
use serde_json::Map;

fn manager() -> (tempfile::TempDir, ConfigHandle) {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    loader.save(&AppConfig::default()).unwrap();
    let manager = Arc::new(ConfigManager::from_loader(loader).unwrap());
    (dir, manager)
}

fn spec(name: &str, model_type: ProviderKind, model_name: &str) -> ModelSpec {
    ModelSpec {
        name: name.to_string(),
        model_type,
        provider: "mock".to_string(),
        model_name: model_name.to_string(),
        config: Map::new(),
        enabled: true,
        priority: 0,
    }
}

#[tokio::test]
async fn default_registry_serves_mock_models() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    assert_eq!(registry.active_embedder().provider_name(), "mock");
    assert_eq!(registry.active_reranker().provider_name(), "mock");
    assert_eq!(registry.active_generator().provider_name(), "mock");

    let vector = registry.active_embedder().embed_query("ready").await.unwrap();
    assert!(!vector.is_empty());
}

#[tokio::test]
async fn add_model_registers_loads_and_persists() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(Arc::clone(&config)).unwrap();
    registry.initialize().await;

    let loaded = registry
        .add_model(spec("alt-embedder", ProviderKind::Embedding, "alt-model"))
        .await
        .unwrap();
    assert!(loaded);

    let configs = registry.get_configs();
    assert!(configs.iter().any(|s| s.name == "alt-embedder"));

    // The embeddings section now names the new model and survives reload.
    assert_eq!(config.get().embeddings.model, "alt-model");
}

#[tokio::test]
async fn add_model_rejects_bad_specs() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();

    let mut bad = spec("", ProviderKind::Embedding, "m");
    bad.name = String::new();
    assert!(matches!(
        registry.add_model(bad).await.unwrap_err(),
        RegistryError::InvalidSpec { .. }
    ));

    let mut unknown = spec("x", ProviderKind::Embedding, "m");
    unknown.provider = "quantum".to_string();
    assert!(matches!(
        registry.add_model(unknown).await.unwrap_err(),
        RegistryError::InvalidSpec { .. }
    ));
}

#[tokio::test]
async fn test_model_probes_by_key_and_model_name() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    registry
        .add_model(spec("probe-target", ProviderKind::Reranking, "probe-model"))
        .await
        .unwrap();

    let by_key = registry
        .test_model(ProviderKind::Reranking, "probe-target")
        .await;
    assert!(by_key.success, "{:?}", by_key.error);

    let by_model_name = registry
        .test_model(ProviderKind::Reranking, "probe-model")
        .await;
    assert!(by_model_name.success);

    let missing = registry.test_model(ProviderKind::Llm, "nope").await;
    assert!(!missing.success);
    assert!(missing.error.unwrap().contains("nope"));
}

#[tokio::test]
async fn switch_active_round_trips() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    let original = registry.active_names()[&ProviderKind::Embedding].clone();
    let before = registry.active_embedder();

    registry
        .add_model(spec("secondary", ProviderKind::Embedding, "secondary-model"))
        .await
        .unwrap();
    registry
        .switch_active(ProviderKind::Embedding, "secondary")
        .await
        .unwrap();

    assert_eq!(
        registry.active_names()[&ProviderKind::Embedding],
        "secondary"
    );
    // The previous instance stays resident.
    assert!(before.embed_query("still alive").await.is_ok());

    registry
        .switch_active(ProviderKind::Embedding, &original)
        .await
        .unwrap();
    assert_eq!(registry.active_names()[&ProviderKind::Embedding], original);
}

#[tokio::test]
async fn switch_rejects_wrong_capability() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    registry
        .add_model(spec("an-embedder", ProviderKind::Embedding, "m1"))
        .await
        .unwrap();

    let err = registry
        .switch_active(ProviderKind::Llm, "an-embedder")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::TypeMismatch { .. }));
}

#[tokio::test]
async fn statuses_and_metrics_reflect_usage() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    registry.active_embedder().embed_query("count me").await.unwrap();

    let statuses = registry.get_statuses().await;
    let name = registry.active_names()[&ProviderKind::Embedding].clone();
    let status = &statuses[&name];
    assert_eq!(status.state, ModelState::Loaded);
    assert_eq!(status.health, HealthStatus::Healthy);
    assert!(status.load_time_ms.is_some());

    let metrics = registry.get_metrics();
    assert_eq!(metrics[&name].total_requests, 1);
}

#[tokio::test]
async fn cleanup_unloads_every_model() {
    let (_dir, config) = manager();
    let registry = ModelRegistry::from_config(config).unwrap();
    registry.initialize().await;

    registry.cleanup().await;
    registry.cleanup().await;

    let statuses = registry.get_statuses().await;
    assert!(statuses.values().all(|s| s.state == ModelState::Unloaded));
}
