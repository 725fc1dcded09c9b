//! Multi-model registry and lifecycle manager.
//!
//! Owns every constructed provider instance and the *active* set — the one
//! embedder, reranker, and generator serving new requests. [`switch_active`]
//! swaps the whole active snapshot atomically: requests started after the
//! switch see the new instance, in-flight requests keep the one they
//! resolved. Previous instances stay resident for rollback.
//!
//! [`switch_active`]: ModelRegistry::switch_active

pub mod error;

#[cfg(test)]
mod tests;

pub use error::RegistryError;

use crate::config::{ConfigHandle, SUPPORTED_PROVIDERS};
use crate::providers::{
    EmbedderHandle, GenerationRequest, GeneratorHandle, HealthStatus, MetricsSnapshot,
    ModelState, ProviderFactory, ProviderKind, RerankerHandle,
};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Registration request for one model (§`/models/add`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique registry key.
    pub name: String,
    /// Capability this model serves.
    pub model_type: ProviderKind,
    /// Provider registry name (`mock`, `siliconflow`, ...).
    pub provider: String,
    /// Model identifier as the provider understands it.
    pub model_name: String,
    /// Provider-specific parameters overlaid on the section defaults.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Disabled models are registered but never made active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Resolution priority when several specs share a `model_name`.
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

/// Status snapshot for one registered model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatusReport {
    pub state: ModelState,
    pub health: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// Result of a `/models/test` probe.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum Instance {
    Embedder(EmbedderHandle),
    Reranker(RerankerHandle),
    Generator(GeneratorHandle),
}

impl Instance {
    fn kind(&self) -> ProviderKind {
        match self {
            Instance::Embedder(_) => ProviderKind::Embedding,
            Instance::Reranker(_) => ProviderKind::Reranking,
            Instance::Generator(_) => ProviderKind::Llm,
        }
    }

    async fn initialize(&self) -> Result<(), crate::providers::ModelError> {
        match self {
            Instance::Embedder(e) => e.initialize().await,
            Instance::Reranker(r) => r.initialize().await,
            Instance::Generator(g) => g.initialize().await,
        }
    }

    async fn cleanup(&self) -> Result<(), crate::providers::ModelError> {
        match self {
            Instance::Embedder(e) => e.cleanup().await,
            Instance::Reranker(r) => r.cleanup().await,
            Instance::Generator(g) => g.cleanup().await,
        }
    }

    fn metrics(&self) -> MetricsSnapshot {
        match self {
            Instance::Embedder(e) => e.metrics(),
            Instance::Reranker(r) => r.metrics(),
            Instance::Generator(g) => g.metrics(),
        }
    }

    async fn health(&self) -> HealthStatus {
        match self {
            Instance::Embedder(e) => e.health_check().await.status,
            Instance::Reranker(r) => r.health_check().await.status,
            Instance::Generator(g) => g.health_check().await.status,
        }
    }
}

struct RegisteredModel {
    spec: ModelSpec,
    instance: Instance,
    state: RwLock<ModelState>,
    load_time_ms: RwLock<Option<u64>>,
    last_error: RwLock<Option<String>>,
}

/// The atomically-published serving set.
struct ActiveSet {
    embedder_name: String,
    embedder: EmbedderHandle,
    reranker_name: String,
    reranker: RerankerHandle,
    generator_name: String,
    generator: GeneratorHandle,
}

/// Registry of constructed models plus the active serving set.
pub struct ModelRegistry {
    factory: ProviderFactory,
    config: ConfigHandle,
    models: RwLock<HashMap<String, Arc<RegisteredModel>>>,
    active: ArcSwap<ActiveSet>,
}

impl ModelRegistry {
    /// Builds the registry with one model per capability from the current
    /// configuration, registered under their configured model names.
    pub fn from_config(config: ConfigHandle) -> Result<Self, RegistryError> {
        let factory = ProviderFactory::new();
        let snapshot = config.get();

        let embedder = factory.create_embedder(&snapshot.embeddings)?;
        let reranker = factory.create_reranker(&snapshot.reranking)?;
        let generator = factory.create_generator(&snapshot.llm)?;

        let active = ActiveSet {
            embedder_name: snapshot.embeddings.model.clone(),
            embedder: Arc::clone(&embedder),
            reranker_name: snapshot.reranking.model.clone(),
            reranker: Arc::clone(&reranker),
            generator_name: snapshot.llm.model.clone(),
            generator: Arc::clone(&generator),
        };

        let mut models = HashMap::new();
        for (name, kind, instance) in [
            (
                snapshot.embeddings.model.clone(),
                ProviderKind::Embedding,
                Instance::Embedder(embedder),
            ),
            (
                snapshot.reranking.model.clone(),
                ProviderKind::Reranking,
                Instance::Reranker(reranker),
            ),
            (
                snapshot.llm.model.clone(),
                ProviderKind::Llm,
                Instance::Generator(generator),
            ),
        ] {
            let provider = match kind {
                ProviderKind::Embedding => snapshot.embeddings.provider.clone(),
                ProviderKind::Reranking => snapshot.reranking.provider.clone(),
                ProviderKind::Llm => snapshot.llm.provider.clone(),
            };
            models.insert(
                name.clone(),
                Arc::new(RegisteredModel {
                    spec: ModelSpec {
                        name: name.clone(),
                        model_type: kind,
                        provider,
                        model_name: name.clone(),
                        config: Map::new(),
                        enabled: true,
                        priority: 0,
                    },
                    instance,
                    state: RwLock::new(ModelState::Unloaded),
                    load_time_ms: RwLock::new(None),
                    last_error: RwLock::new(None),
                }),
            );
        }

        Ok(Self {
            factory,
            config,
            models: RwLock::new(models),
            active: ArcSwap::from_pointee(active),
        })
    }

    /// Initializes every registered instance, recording per-model outcomes.
    /// Individual failures do not abort the others.
    pub async fn initialize(&self) {
        let models: Vec<Arc<RegisteredModel>> = self.models.read().values().cloned().collect();
        for model in models {
            Self::load_instance(&model).await;
        }
    }

    async fn load_instance(model: &RegisteredModel) {
        *model.state.write() = ModelState::Loading;
        let start = Instant::now();
        match model.instance.initialize().await {
            Ok(()) => {
                *model.state.write() = ModelState::Loaded;
                *model.load_time_ms.write() = Some(start.elapsed().as_millis() as u64);
                *model.last_error.write() = None;
            }
            Err(e) => {
                warn!(model = %model.spec.name, error = %e, "model initialization failed");
                *model.state.write() = ModelState::Error;
                *model.last_error.write() = Some(e.to_string());
            }
        }
    }

    /// The embedder serving new requests.
    pub fn active_embedder(&self) -> EmbedderHandle {
        Arc::clone(&self.active.load().embedder)
    }

    /// The reranker serving new requests.
    pub fn active_reranker(&self) -> RerankerHandle {
        Arc::clone(&self.active.load().reranker)
    }

    /// The generator serving new requests.
    pub fn active_generator(&self) -> GeneratorHandle {
        Arc::clone(&self.active.load().generator)
    }

    /// Registry keys of the active set, by capability.
    pub fn active_names(&self) -> HashMap<ProviderKind, String> {
        let active = self.active.load();
        HashMap::from([
            (ProviderKind::Embedding, active.embedder_name.clone()),
            (ProviderKind::Reranking, active.reranker_name.clone()),
            (ProviderKind::Llm, active.generator_name.clone()),
        ])
    }

    /// Validates, constructs, registers, and lazily initializes a model,
    /// then persists the matching config section so the choice survives a
    /// restart. Returns whether the instance loaded cleanly.
    pub async fn add_model(&self, spec: ModelSpec) -> Result<bool, RegistryError> {
        if spec.name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec {
                message: "name must not be empty".to_string(),
            });
        }
        if spec.model_name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec {
                message: "model_name must not be empty".to_string(),
            });
        }
        if !spec.provider.is_empty() && !SUPPORTED_PROVIDERS.contains(&spec.provider.as_str()) {
            return Err(RegistryError::InvalidSpec {
                message: format!("provider '{}' is not supported", spec.provider),
            });
        }

        let section_value = self.section_for_spec(&spec)?;
        let instance = self.construct(&spec, &section_value)?;

        let model = Arc::new(RegisteredModel {
            spec: spec.clone(),
            instance,
            state: RwLock::new(ModelState::Unloaded),
            load_time_ms: RwLock::new(None),
            last_error: RwLock::new(None),
        });

        Self::load_instance(&model).await;
        let loaded = *model.state.read() == ModelState::Loaded;

        self.models.write().insert(spec.name.clone(), model);
        info!(name = %spec.name, model_type = %spec.model_type, loaded, "model registered");

        // Persist so the registration survives restart; the live snapshot
        // is published by the config manager.
        if spec.enabled {
            let section = match spec.model_type {
                ProviderKind::Embedding => "embeddings",
                ProviderKind::Reranking => "reranking",
                ProviderKind::Llm => "llm",
            };
            self.config.replace_section(section, section_value)?;
        }

        Ok(loaded)
    }

    /// Builds the section JSON for a registration: current section values
    /// overlaid with the requested provider, model name, and parameters.
    fn section_for_spec(&self, spec: &ModelSpec) -> Result<Value, RegistryError> {
        let section_name = match spec.model_type {
            ProviderKind::Embedding => "embeddings",
            ProviderKind::Reranking => "reranking",
            ProviderKind::Llm => "llm",
        };
        let mut section = self.config.get().section_value(section_name)?;

        let Value::Object(base) = &mut section else {
            return Err(RegistryError::InvalidSpec {
                message: format!("section '{section_name}' is not an object"),
            });
        };
        base.insert("provider".to_string(), Value::String(spec.provider.clone()));
        base.insert("model".to_string(), Value::String(spec.model_name.clone()));
        for (key, value) in &spec.config {
            base.insert(key.clone(), value.clone());
        }

        Ok(section)
    }

    fn construct(&self, spec: &ModelSpec, section: &Value) -> Result<Instance, RegistryError> {
        let instance = match spec.model_type {
            ProviderKind::Embedding => {
                let config = serde_json::from_value(section.clone()).map_err(|e| {
                    RegistryError::InvalidSpec {
                        message: format!("embeddings config: {e}"),
                    }
                })?;
                Instance::Embedder(self.factory.create_embedder(&config)?)
            }
            ProviderKind::Reranking => {
                let config = serde_json::from_value(section.clone()).map_err(|e| {
                    RegistryError::InvalidSpec {
                        message: format!("reranking config: {e}"),
                    }
                })?;
                Instance::Reranker(self.factory.create_reranker(&config)?)
            }
            ProviderKind::Llm => {
                let config = serde_json::from_value(section.clone()).map_err(|e| {
                    RegistryError::InvalidSpec {
                        message: format!("llm config: {e}"),
                    }
                })?;
                Instance::Generator(self.factory.create_generator(&config)?)
            }
        };
        Ok(instance)
    }

    /// Finds a model by registry key, else by `model_name` within the
    /// capability (highest `priority` wins).
    fn resolve(
        &self,
        model_type: ProviderKind,
        name: &str,
    ) -> Result<Arc<RegisteredModel>, RegistryError> {
        let models = self.models.read();

        if let Some(model) = models.get(name) {
            if model.spec.model_type != model_type {
                return Err(RegistryError::TypeMismatch {
                    name: name.to_string(),
                    expected: model_type.to_string(),
                    actual: model.spec.model_type.to_string(),
                });
            }
            return Ok(Arc::clone(model));
        }

        models
            .values()
            .filter(|m| m.spec.model_type == model_type && m.spec.model_name == name)
            .max_by_key(|m| m.spec.priority)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownModel {
                model_type: model_type.to_string(),
                name: name.to_string(),
            })
    }

    /// Minimal end-to-end probe of one registered model.
    pub async fn test_model(&self, model_type: ProviderKind, name: &str) -> TestReport {
        let model = match self.resolve(model_type, name) {
            Ok(model) => model,
            Err(e) => {
                return TestReport {
                    success: false,
                    latency_ms: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        let start = Instant::now();
        let outcome = async {
            model.instance.initialize().await?;
            match &model.instance {
                Instance::Embedder(e) => e.embed_query("test").await.map(|_| ()),
                Instance::Reranker(r) => r
                    .rerank("test", &["test document".to_string()])
                    .await
                    .map(|_| ()),
                Instance::Generator(g) => g
                    .generate(GenerationRequest {
                        system: None,
                        prompt: "test".to_string(),
                        temperature: 0.0,
                        max_tokens: 1,
                    })
                    .await
                    .map(|_| ()),
            }
        }
        .await;

        let latency_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => TestReport {
                success: true,
                latency_ms,
                error: None,
            },
            Err(e) => TestReport {
                success: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }

    /// Atomically retargets the active set for one capability.
    ///
    /// The previous instance is not torn down; it stays registered for
    /// rollback, and in-flight requests keep using it.
    pub async fn switch_active(
        &self,
        model_type: ProviderKind,
        name: &str,
    ) -> Result<(), RegistryError> {
        let model = self.resolve(model_type, name)?;
        if !model.spec.enabled {
            return Err(RegistryError::InvalidSpec {
                message: format!("model '{name}' is disabled"),
            });
        }

        // Late initialization: switching to a never-used model loads it now.
        if *model.state.read() != ModelState::Loaded {
            Self::load_instance(&model).await;
            if *model.state.read() != ModelState::Loaded {
                let message = model.last_error.read().clone().unwrap_or_default();
                return Err(RegistryError::Model(
                    crate::providers::ModelError::InitializationFailed { message },
                ));
            }
        }

        let key = model.spec.name.clone();
        self.active.rcu(|current| {
            let mut next = ActiveSet {
                embedder_name: current.embedder_name.clone(),
                embedder: Arc::clone(&current.embedder),
                reranker_name: current.reranker_name.clone(),
                reranker: Arc::clone(&current.reranker),
                generator_name: current.generator_name.clone(),
                generator: Arc::clone(&current.generator),
            };
            match &model.instance {
                Instance::Embedder(e) => {
                    next.embedder = Arc::clone(e);
                    next.embedder_name = key.clone();
                }
                Instance::Reranker(r) => {
                    next.reranker = Arc::clone(r);
                    next.reranker_name = key.clone();
                }
                Instance::Generator(g) => {
                    next.generator = Arc::clone(g);
                    next.generator_name = key.clone();
                }
            }
            next
        });

        info!(model_type = %model_type, name = %key, "active model switched");
        Ok(())
    }

    /// Registered specs, sorted by name.
    pub fn get_configs(&self) -> Vec<ModelSpec> {
        let mut specs: Vec<ModelSpec> = self
            .models
            .read()
            .values()
            .map(|m| m.spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Per-model status snapshots (probes health, so async).
    pub async fn get_statuses(&self) -> HashMap<String, ModelStatusReport> {
        let models: Vec<(String, Arc<RegisteredModel>)> = self
            .models
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let mut statuses = HashMap::with_capacity(models.len());
        for (name, model) in models {
            let state = *model.state.read();
            let health = if state == ModelState::Loaded {
                model.instance.health().await
            } else {
                HealthStatus::Unknown
            };
            statuses.insert(
                name,
                ModelStatusReport {
                    state,
                    health,
                    load_time_ms: *model.load_time_ms.read(),
                    last_error: model.last_error.read().clone(),
                    metrics: model.instance.metrics(),
                },
            );
        }
        statuses
    }

    /// Per-model counter snapshots.
    pub fn get_metrics(&self) -> HashMap<String, MetricsSnapshot> {
        self.models
            .read()
            .iter()
            .map(|(name, model)| (name.clone(), model.instance.metrics()))
            .collect()
    }

    /// Cleans up every registered instance. Idempotent.
    pub async fn cleanup(&self) {
        let models: Vec<Arc<RegisteredModel>> = self.models.read().values().cloned().collect();
        for model in models {
            if let Err(e) = model.instance.cleanup().await {
                warn!(model = %model.spec.name, error = %e, "cleanup failed");
            }
            *model.state.write() = ModelState::Unloaded;
        }
    }
}

/// Shared registry handle.
pub type RegistryHandle = Arc<ModelRegistry>;
