//! Provider registry and factory.
//!
//! Maps provider names to constructors for each capability. The `mock`
//! provider is registered eagerly; remote and local providers register at
//! construction but fail closed with [`ModelError::UnsupportedProvider`]
//! when their configuration cannot produce a working instance.
//!
//! When a config block leaves `provider` empty but supplies both `api_key`
//! and `base_url`, the provider is inferred from the URL; with no remote
//! credentials at all the factory falls back to the local provider.

use super::error::ModelError;
use super::local::{LocalEmbedder, LocalReranker};
use super::mock::{MockEmbedder, MockGenerator, MockReranker};
use super::openai::{OpenAiEmbedder, OpenAiGenerator};
use super::siliconflow::{SiliconFlowEmbedder, SiliconFlowGenerator, SiliconFlowReranker};
use super::{EmbedderHandle, GeneratorHandle, RerankerHandle};
use crate::config::{EmbeddingsConfig, LlmConfig, RerankingConfig};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The three model capabilities the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Embedding,
    Reranking,
    Llm,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Embedding => "embedding",
            ProviderKind::Reranking => "reranking",
            ProviderKind::Llm => "llm",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embedding" | "embeddings" => Ok(ProviderKind::Embedding),
            "reranking" | "rerank" => Ok(ProviderKind::Reranking),
            "llm" | "generation" => Ok(ProviderKind::Llm),
            other => Err(format!(
                "unknown model type '{other}' (expected embedding, reranking, or llm)"
            )),
        }
    }
}

type EmbedderBuilder = fn(&EmbeddingsConfig) -> Result<EmbedderHandle, ModelError>;
type RerankerBuilder = fn(&RerankingConfig) -> Result<RerankerHandle, ModelError>;
type GeneratorBuilder = fn(&LlmConfig) -> Result<GeneratorHandle, ModelError>;

/// Registry from provider name to constructor, per capability.
pub struct ProviderFactory {
    embedders: HashMap<&'static str, EmbedderBuilder>,
    rerankers: HashMap<&'static str, RerankerBuilder>,
    generators: HashMap<&'static str, GeneratorBuilder>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    /// Registry with every built-in provider.
    pub fn new() -> Self {
        let mut factory = Self {
            embedders: HashMap::new(),
            rerankers: HashMap::new(),
            generators: HashMap::new(),
        };

        factory.embedders.insert("mock", build_mock_embedder);
        factory.rerankers.insert("mock", build_mock_reranker);
        factory.generators.insert("mock", build_mock_generator);

        factory.embedders.insert("siliconflow", build_siliconflow_embedder);
        factory.rerankers.insert("siliconflow", build_siliconflow_reranker);
        factory.generators.insert("siliconflow", build_siliconflow_generator);

        factory.embedders.insert("openai", build_openai_embedder);
        factory.generators.insert("openai", build_openai_generator);

        for name in ["local", "sentence_transformers", "huggingface"] {
            factory.embedders.insert(name, build_local_embedder);
            factory.rerankers.insert(name, build_local_reranker);
        }

        factory
    }

    /// Provider names registered for a capability.
    pub fn registered(&self, kind: ProviderKind) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = match kind {
            ProviderKind::Embedding => self.embedders.keys().copied().collect(),
            ProviderKind::Reranking => self.rerankers.keys().copied().collect(),
            ProviderKind::Llm => self.generators.keys().copied().collect(),
        };
        names.sort_unstable();
        names
    }

    /// Builds an embedder for the configured (or detected) provider.
    pub fn create_embedder(&self, config: &EmbeddingsConfig) -> Result<EmbedderHandle, ModelError> {
        let provider = resolve_provider(
            &config.provider,
            config.api_key.as_deref(),
            config.base_url.as_deref(),
        );
        let builder = self.embedders.get(provider.as_str()).ok_or_else(|| {
            ModelError::UnsupportedProvider {
                provider: provider.clone(),
                reason: "no embedding constructor registered".to_string(),
            }
        })?;
        builder(config)
    }

    /// Builds `(primary, fallback)`; the fallback is present only when
    /// `enable_fallback` is set and the fallback spec constructs cleanly.
    pub fn create_embedder_with_fallback(
        &self,
        config: &EmbeddingsConfig,
    ) -> Result<(EmbedderHandle, Option<EmbedderHandle>), ModelError> {
        let primary = self.create_embedder(config)?;

        let fallback = if config.enable_fallback {
            let mut spec = config.clone();
            spec.provider = config.fallback_provider.clone();
            match self.create_embedder(&spec) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(
                        fallback = %config.fallback_provider,
                        error = %e,
                        "embedding fallback provider unavailable"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok((primary, fallback))
    }

    /// Builds a reranker for the configured (or detected) provider.
    pub fn create_reranker(&self, config: &RerankingConfig) -> Result<RerankerHandle, ModelError> {
        let provider = resolve_provider(
            &config.provider,
            config.api_key.as_deref(),
            config.base_url.as_deref(),
        );
        let builder = self.rerankers.get(provider.as_str()).ok_or_else(|| {
            ModelError::UnsupportedProvider {
                provider: provider.clone(),
                reason: "no reranking constructor registered".to_string(),
            }
        })?;
        builder(config)
    }

    /// Builds `(primary, fallback)` rerankers, mirroring
    /// [`Self::create_embedder_with_fallback`].
    pub fn create_reranker_with_fallback(
        &self,
        config: &RerankingConfig,
    ) -> Result<(RerankerHandle, Option<RerankerHandle>), ModelError> {
        let primary = self.create_reranker(config)?;

        let fallback = if config.enable_fallback {
            let mut spec = config.clone();
            spec.provider = config.fallback_provider.clone();
            match self.create_reranker(&spec) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(
                        fallback = %config.fallback_provider,
                        error = %e,
                        "reranking fallback provider unavailable"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok((primary, fallback))
    }

    /// Builds a generator for the configured (or detected) provider.
    pub fn create_generator(&self, config: &LlmConfig) -> Result<GeneratorHandle, ModelError> {
        let provider = resolve_provider(
            &config.provider,
            config.api_key.as_deref(),
            config.base_url.as_deref(),
        );
        let builder = self.generators.get(provider.as_str()).ok_or_else(|| {
            ModelError::UnsupportedProvider {
                provider: provider.clone(),
                reason: "no generation constructor registered".to_string(),
            }
        })?;
        builder(config)
    }
}

/// Picks the effective provider name.
///
/// An explicit name wins. An empty name with both `api_key` and `base_url`
/// is inferred from the URL host; anything else defaults to `local`.
pub fn resolve_provider(provider: &str, api_key: Option<&str>, base_url: Option<&str>) -> String {
    let provider = provider.trim();
    if !provider.is_empty() {
        return provider.to_string();
    }

    if let (Some(key), Some(url)) = (api_key, base_url) {
        if !key.is_empty() {
            let url = url.to_ascii_lowercase();
            if url.contains("siliconflow") {
                info!(base_url = %url, "auto-detected siliconflow provider");
                return "siliconflow".to_string();
            }
            if url.contains("openai") {
                info!(base_url = %url, "auto-detected openai provider");
                return "openai".to_string();
            }
        }
    }

    "local".to_string()
}

fn build_mock_embedder(config: &EmbeddingsConfig) -> Result<EmbedderHandle, ModelError> {
    let embedder = match config.dimensions {
        Some(dims) => MockEmbedder::with_dimensions(&config.model, dims),
        None => MockEmbedder::new(&config.model),
    };
    Ok(Arc::new(embedder))
}

fn build_mock_reranker(config: &RerankingConfig) -> Result<RerankerHandle, ModelError> {
    Ok(Arc::new(MockReranker::new(&config.model)))
}

fn build_mock_generator(config: &LlmConfig) -> Result<GeneratorHandle, ModelError> {
    Ok(Arc::new(MockGenerator::new(&config.model)))
}

fn build_siliconflow_embedder(config: &EmbeddingsConfig) -> Result<EmbedderHandle, ModelError> {
    Ok(Arc::new(SiliconFlowEmbedder::from_config(config)?))
}

fn build_siliconflow_reranker(config: &RerankingConfig) -> Result<RerankerHandle, ModelError> {
    Ok(Arc::new(SiliconFlowReranker::from_config(config)?))
}

fn build_siliconflow_generator(config: &LlmConfig) -> Result<GeneratorHandle, ModelError> {
    Ok(Arc::new(SiliconFlowGenerator::from_config(config)?))
}

fn build_openai_embedder(config: &EmbeddingsConfig) -> Result<EmbedderHandle, ModelError> {
    Ok(Arc::new(OpenAiEmbedder::from_config(config)?))
}

fn build_openai_generator(config: &LlmConfig) -> Result<GeneratorHandle, ModelError> {
    Ok(Arc::new(OpenAiGenerator::from_config(config)?))
}

fn build_local_embedder(config: &EmbeddingsConfig) -> Result<EmbedderHandle, ModelError> {
    Ok(Arc::new(LocalEmbedder::from_config(config)))
}

fn build_local_reranker(config: &RerankingConfig) -> Result<RerankerHandle, ModelError> {
    Ok(Arc::new(LocalReranker::from_config(config)))
}
