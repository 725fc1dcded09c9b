//! Model provider abstraction.
//!
//! Three capability traits with one uniform shape each — [`Embedder`],
//! [`Reranker`], [`Generator`] — plus the [`factory`] that maps provider
//! names to constructors.
//!
//! Implementations share the same lifecycle: `initialize()` is idempotent
//! and safe to call concurrently (the second caller observes the first
//! caller's outcome), a failed initialization is sticky, and `cleanup()`
//! returns the instance to the unloaded state.
//!
//! - [`mock`] is always available and fully deterministic.
//! - [`siliconflow`] / [`openai`] are remote HTTP providers with bounded
//!   concurrency, request spacing, and capped exponential backoff.
//! - [`local`] runs candle models in-process, with a stub mode when no
//!   model files are configured.

pub mod error;
pub mod factory;
mod lifecycle;
pub mod local;
pub mod metrics;
pub mod mock;
pub mod openai;
mod remote;
pub mod siliconflow;

#[cfg(test)]
mod tests;

pub use error::ModelError;
pub use factory::{ProviderFactory, ProviderKind};
pub use lifecycle::LifecycleCell;
pub use metrics::{MetricsSnapshot, ProviderMetrics};
pub use mock::{MockEmbedder, MockGenerator, MockReranker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse lifecycle state of one provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    /// Not yet initialized (or cleaned up).
    Unloaded,
    /// `initialize()` in flight.
    Loading,
    /// Ready to serve.
    Loaded,
    /// Initialization or an unrecoverable operation failed.
    Error,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Loaded => "loaded",
            ModelState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Health classification reported by [`Embedder::health_check`] and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Not yet probed.
    Unknown,
}

/// Health probe result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall classification.
    pub status: HealthStatus,
    /// Whether the underlying model/client is loaded.
    pub model_loaded: bool,
    /// Embedding dimension, where the capability has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Failure detail for degraded/unhealthy reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthReport {
    /// A healthy report for a loaded model.
    pub fn healthy(dimensions: Option<usize>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            model_loaded: true,
            dimensions,
            message: None,
        }
    }

    /// An unhealthy report carrying the failure message.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            model_loaded: false,
            dimensions: None,
            message: Some(message.into()),
        }
    }
}

/// Generation parameters passed to a [`Generator`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Optional system message.
    pub system: Option<String>,
    /// User prompt (question plus assembled context).
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Output of a [`Generator::generate`] call.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// The generated text.
    pub text: String,
    /// Prompt token count, if the provider reports usage.
    pub prompt_tokens: Option<u32>,
    /// Completion token count, if the provider reports usage.
    pub completion_tokens: Option<u32>,
}

/// A model that turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Idempotent, concurrency-safe initialization.
    async fn initialize(&self) -> Result<(), ModelError>;

    /// Embeds one query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Embeds a batch; output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;

    /// Releases clients and model handles. Idempotent.
    async fn cleanup(&self) -> Result<(), ModelError>;

    /// Probes the instance.
    async fn health_check(&self) -> HealthReport;

    /// Counter snapshot.
    fn metrics(&self) -> MetricsSnapshot;

    /// Model identifier as understood by the provider.
    fn model_name(&self) -> &str;

    /// Provider registry name (`mock`, `siliconflow`, ...).
    fn provider_name(&self) -> &'static str;

    /// Output dimension, once known.
    fn dimensions(&self) -> Option<usize>;

    /// Preferred texts-per-request batch size.
    fn batch_size(&self) -> usize;
}

impl std::fmt::Debug for dyn Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider_name())
            .field("model", &self.model_name())
            .finish()
    }
}

/// A cross-encoder that scores (query, document) pairs.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Idempotent, concurrency-safe initialization.
    async fn initialize(&self) -> Result<(), ModelError>;

    /// Scores `documents` against `query`.
    ///
    /// The output is aligned with the input order; higher means more
    /// relevant. An empty `documents` slice yields an empty score list
    /// without touching the backend.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError>;

    /// Batched form of [`Self::rerank`], one query per document list.
    async fn rerank_batch(
        &self,
        queries: &[String],
        documents: &[Vec<String>],
    ) -> Result<Vec<Vec<f32>>, ModelError>;

    /// Releases clients and model handles. Idempotent.
    async fn cleanup(&self) -> Result<(), ModelError>;

    /// Probes the instance.
    async fn health_check(&self) -> HealthReport;

    /// Counter snapshot.
    fn metrics(&self) -> MetricsSnapshot;

    /// Model identifier as understood by the provider.
    fn model_name(&self) -> &str;

    /// Provider registry name.
    fn provider_name(&self) -> &'static str;

    /// Preferred pairs-per-request batch size.
    fn batch_size(&self) -> usize;
}

impl std::fmt::Debug for dyn Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("provider", &self.provider_name())
            .field("model", &self.model_name())
            .finish()
    }
}

/// A text generation model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Idempotent, concurrency-safe initialization.
    async fn initialize(&self) -> Result<(), ModelError>;

    /// Generates a completion.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, ModelError>;

    /// Releases clients and model handles. Idempotent.
    async fn cleanup(&self) -> Result<(), ModelError>;

    /// Probes the instance.
    async fn health_check(&self) -> HealthReport;

    /// Counter snapshot.
    fn metrics(&self) -> MetricsSnapshot;

    /// Model identifier as understood by the provider.
    fn model_name(&self) -> &str;

    /// Provider registry name.
    fn provider_name(&self) -> &'static str;
}

/// Shared embedder handle.
pub type EmbedderHandle = Arc<dyn Embedder>;
/// Shared reranker handle.
pub type RerankerHandle = Arc<dyn Reranker>;
/// Shared generator handle.
pub type GeneratorHandle = Arc<dyn Generator>;

/// Truncates to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Rejects empty or whitespace-only input.
pub(crate) fn require_non_empty(what: &'static str, text: &str) -> Result<(), ModelError> {
    if text.trim().is_empty() {
        Err(ModelError::EmptyInput { what })
    } else {
        Ok(())
    }
}
