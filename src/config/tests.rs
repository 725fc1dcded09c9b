use super::loader::substitute_placeholders;
use super::*;
use serial_test::serial;
use std::env;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

#[test]
fn default_config_is_valid() {
    let config = AppConfig::default();
    config.validate().expect("defaults must validate");

    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.retrieval.search_mode, SearchMode::Semantic);
    assert!((config.retrieval.hybrid_alpha - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.embeddings.chunk_size, 1000);
    assert_eq!(config.api.socket_addr(), "127.0.0.1:8080");
}

#[test]
fn chunk_overlap_must_stay_below_chunk_size() {
    let mut config = AppConfig::default();
    config.embeddings.chunk_overlap = config.embeddings.chunk_size;

    let err = config.validate().unwrap_err();
    let ConfigError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.contains("chunk_overlap")));
}

#[test]
fn validation_aggregates_all_failures() {
    let mut config = AppConfig::default();
    config.retrieval.top_k = 0;
    config.retrieval.similarity_threshold = 1.5;
    config.llm.temperature = 3.0;

    let ConfigError::Validation { errors } = config.validate().unwrap_err() else {
        panic!("expected validation error");
    };
    assert_eq!(errors.len(), 3, "all failures reported at once: {errors:?}");
}

#[test]
fn unsupported_provider_is_rejected() {
    let mut config = AppConfig::default();
    config.embeddings.provider = "magic".to_string();

    let ConfigError::Validation { errors } = config.validate().unwrap_err() else {
        panic!("expected validation error");
    };
    assert!(errors[0].contains("magic"));
}

#[test]
fn search_mode_parses_and_displays() {
    assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
    assert_eq!(SearchMode::Keyword.to_string(), "keyword");
    assert!("fuzzy".parse::<SearchMode>().is_err());

    let mode: SearchMode = serde_json::from_str("\"semantic\"").unwrap();
    assert_eq!(mode, SearchMode::Semantic);
}

#[test]
#[serial]
fn placeholder_substitution_uses_env_and_defaults() {
    with_env_vars(&[("CORPORA_TEST_DB", "sqlite:///tmp/x.db")], || {
        let out =
            substitute_placeholders("url: ${CORPORA_TEST_DB}\nname: ${CORPORA_UNSET:fallback}")
                .unwrap();
        assert_eq!(out, "url: sqlite:///tmp/x.db\nname: fallback");
    });
}

#[test]
#[serial]
fn missing_placeholder_without_default_is_an_error() {
    let err = substitute_placeholders("key: ${CORPORA_DEFINITELY_UNSET}").unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar { name } if name == "CORPORA_DEFINITELY_UNSET"));
}

#[test]
#[serial]
fn loads_yaml_with_alias_and_unknown_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
embedding:
  provider: mock
  model: probe-model
retrieval:
  top_k: 7
  search_mode: hybrid
telemetry:
  endpoint: ignored
"#,
    )
    .unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    assert_eq!(config.embeddings.model, "probe-model");
    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.retrieval.search_mode, SearchMode::Hybrid);
}

#[test]
fn unknown_field_inside_section_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "retrieval:\n  top_k: 3\n  fuzziness: 2\n").unwrap();

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSection { section, .. } if section == "retrieval"));
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");

    let mut config = AppConfig::default();
    config.retrieval.top_k = 9;
    config.retrieval.search_mode = SearchMode::Keyword;
    config.embeddings.dimensions = Some(768);

    let loader = ConfigLoader::new(&path);
    loader.save(&config).unwrap();
    let reloaded = loader.load().unwrap();

    assert_eq!(config, reloaded);
}

#[test]
fn update_section_merges_persists_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let loader = ConfigLoader::new(&path);
    loader.save(&AppConfig::default()).unwrap();

    let manager = ConfigManager::from_loader(loader.clone()).unwrap();
    let mut updates = manager.subscribe();

    let snapshot = manager
        .update_section(
            "retrieval",
            serde_json::json!({"search_mode": "keyword", "top_k": 3}),
        )
        .unwrap();

    assert_eq!(snapshot.retrieval.search_mode, SearchMode::Keyword);
    assert_eq!(snapshot.retrieval.top_k, 3);
    // Unmentioned fields keep their old values.
    assert!((snapshot.retrieval.hybrid_alpha - 0.7).abs() < f32::EPSILON);

    assert!(updates.has_changed().unwrap());
    assert_eq!(
        updates.borrow_and_update().retrieval.search_mode,
        SearchMode::Keyword
    );

    // Persisted: a fresh loader sees the new values.
    let reloaded = loader.load().unwrap();
    assert_eq!(reloaded.retrieval.search_mode, SearchMode::Keyword);
}

#[test]
fn rejected_update_leaves_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    loader.save(&AppConfig::default()).unwrap();
    let manager = ConfigManager::from_loader(loader).unwrap();

    let err = manager
        .update_section(
            "embeddings",
            serde_json::json!({"chunk_overlap": 1000, "chunk_size": 1000}),
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::Validation { .. }));

    assert_eq!(manager.get().embeddings.chunk_overlap, 200);
}

#[test]
fn validate_update_reports_without_applying() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    loader.save(&AppConfig::default()).unwrap();
    let manager = ConfigManager::from_loader(loader).unwrap();

    let report = manager.validate_update("retrieval", serde_json::json!({"top_k": 0}));
    assert!(!report.valid);
    assert!(!report.errors.is_empty());
    assert_eq!(manager.get().retrieval.top_k, 5);

    let ok = manager.validate_update("retrieval", serde_json::json!({"top_k": 100}));
    assert!(ok.valid);
    assert!(ok.warnings.iter().any(|w| w.contains("top_k")));
}

#[test]
fn unknown_section_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::new(dir.path().join("config.yaml"));
    loader.save(&AppConfig::default()).unwrap();
    let manager = ConfigManager::from_loader(loader).unwrap();

    let err = manager.section("telemetry").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSection { name } if name == "telemetry"));
}
