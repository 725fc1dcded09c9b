//! OpenAI-compatible API providers (embeddings, chat).
//!
//! OpenAI has no reranking endpoint; configuring `openai` as a reranking
//! provider fails closed in the factory.

use super::error::ModelError;
use super::lifecycle::LifecycleCell;
use super::metrics::{MetricsSnapshot, ProviderMetrics};
use super::remote::{
    RemoteClient, RemoteSettings, parse_chat_response, parse_embeddings_response,
};
use super::{
    Embedder, GenerationOutput, GenerationRequest, Generator, HealthReport, HealthStatus,
    require_non_empty, truncate_chars,
};
use crate::config::{EmbeddingsConfig, LlmConfig};
use async_trait::async_trait;
use serde_json::json;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::info;

const PROVIDER: &str = "openai";

/// Default endpoint when the config omits `base_url`.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

fn settings(
    api_key: Option<&String>,
    base_url: Option<&String>,
    timeout_secs: u64,
    max_concurrent_requests: usize,
    request_interval_ms: u64,
    retry_attempts: u32,
) -> Result<RemoteSettings, ModelError> {
    let api_key = api_key.cloned().ok_or_else(|| ModelError::InvalidConfig {
        message: "openai requires an api_key".to_string(),
    })?;

    Ok(RemoteSettings {
        base_url: base_url.cloned().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_key,
        timeout: Duration::from_secs(timeout_secs),
        max_concurrent_requests,
        request_interval: (request_interval_ms > 0)
            .then(|| Duration::from_millis(request_interval_ms)),
        retry_attempts,
    })
}

/// Embeddings over `POST /embeddings`.
pub struct OpenAiEmbedder {
    model: String,
    max_length: usize,
    batch_size: usize,
    configured_dimensions: Option<usize>,
    discovered_dimensions: OnceLock<usize>,
    client: RemoteClient,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
}

impl OpenAiEmbedder {
    /// Builds from the `embeddings` config section.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self, ModelError> {
        let client = RemoteClient::new(
            PROVIDER,
            settings(
                config.api_key.as_ref(),
                config.base_url.as_ref(),
                config.timeout_secs,
                config.max_concurrent_requests,
                config.request_interval_ms,
                config.retry_attempts,
            )?,
        )?;

        Ok(Self {
            model: config.model.clone(),
            max_length: config.max_length,
            batch_size: config.batch_size,
            configured_dimensions: config.dimensions,
            discovered_dimensions: OnceLock::new(),
            client,
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
        })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let inputs: Vec<&str> = texts
            .iter()
            .map(|t| truncate_chars(t, self.max_length))
            .collect();

        let mut body = json!({
            "model": self.model,
            "input": inputs,
        });
        // text-embedding-3-* accept a requested output dimension.
        if let Some(dimensions) = self.configured_dimensions {
            body["dimensions"] = json!(dimensions);
        }

        let response = self.client.post_json("/embeddings", &body).await?;
        let vectors = parse_embeddings_response(PROVIDER, &response, texts.len())?;
        if let Some(first) = vectors.first() {
            let _ = self.discovered_dimensions.set(first.len());
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle
            .initialize(|| async {
                info!(model = %self.model, "openai embedder ready");
                Ok(())
            })
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        require_non_empty("query text", text)?;

        let start = Instant::now();
        let texts = [text.to_string()];
        match self.request_embeddings(&texts).await {
            Ok(mut vectors) => {
                self.metrics.record_success(start.elapsed(), 1);
                Ok(vectors.remove(0))
            }
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                Err(e)
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            require_non_empty("batch text", text)?;
        }

        let start = Instant::now();
        match self.request_embeddings(texts).await {
            Ok(vectors) => {
                self.metrics
                    .record_success(start.elapsed(), texts.len() as u64);
                Ok(vectors)
            }
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                Err(e)
            }
        }
    }

    async fn cleanup(&self) -> Result<(), ModelError> {
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if !self.lifecycle.is_loaded() {
            return HealthReport::unhealthy("not initialized");
        }
        match self.embed_query("health check").await {
            Ok(vector) => HealthReport::healthy(Some(vector.len())),
            Err(e) => HealthReport {
                status: HealthStatus::Unhealthy,
                model_loaded: true,
                dimensions: self.dimensions(),
                message: Some(e.to_string()),
            },
        }
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn dimensions(&self) -> Option<usize> {
        self.discovered_dimensions
            .get()
            .copied()
            .or(self.configured_dimensions)
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Chat completion over `POST /chat/completions`.
pub struct OpenAiGenerator {
    model: String,
    client: RemoteClient,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
}

impl OpenAiGenerator {
    /// Builds from the `llm` config section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let client = RemoteClient::new(
            PROVIDER,
            settings(
                config.api_key.as_ref(),
                config.base_url.as_ref(),
                config.timeout_secs,
                4,
                0,
                config.retry_attempts,
            )?,
        )?;

        Ok(Self {
            model: config.model.clone(),
            client,
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle
            .initialize(|| async {
                info!(model = %self.model, "openai generator ready");
                Ok(())
            })
            .await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        require_non_empty("prompt", &request.prompt)?;
        if request.temperature < 0.0 {
            return Err(ModelError::InvalidInput {
                message: format!("temperature must be non-negative, got {}", request.temperature),
            });
        }

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let start = Instant::now();
        let result = self.client.post_json("/chat/completions", &body).await;
        match result.and_then(|response| parse_chat_response(PROVIDER, &response)) {
            Ok((text, prompt_tokens, completion_tokens)) => {
                let units = completion_tokens.unwrap_or(0) as u64;
                self.metrics.record_success(start.elapsed(), units);
                Ok(GenerationOutput {
                    text,
                    prompt_tokens,
                    completion_tokens,
                })
            }
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                Err(e)
            }
        }
    }

    async fn cleanup(&self) -> Result<(), ModelError> {
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if !self.lifecycle.is_loaded() {
            return HealthReport::unhealthy("not initialized");
        }
        let probe = GenerationRequest {
            system: None,
            prompt: "ping".to_string(),
            temperature: 0.0,
            max_tokens: 1,
        };
        match self.generate(probe).await {
            Ok(_) => HealthReport::healthy(None),
            Err(e) => HealthReport {
                status: HealthStatus::Unhealthy,
                model_loaded: true,
                dimensions: None,
                message: Some(e.to_string()),
            },
        }
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
