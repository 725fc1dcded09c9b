//! In-process providers backed by candle BERT checkpoints.
//!
//! The embedder mean-pools a BERT encoder; the reranker is a
//! sequence-classification cross-encoder (encoder + pooler + linear head).
//! When the configured model directory is absent the instance runs in stub
//! mode: deterministic pseudo-vectors and overlap scores, enough for
//! development without checkpoint downloads.
//!
//! Expected directory layout: `config.json`, `model.safetensors`,
//! `tokenizer.json`.

use super::error::ModelError;
use super::lifecycle::LifecycleCell;
use super::metrics::{MetricsSnapshot, ProviderMetrics};
use super::{
    Embedder, HealthReport, HealthStatus, Reranker, require_non_empty, truncate_chars,
};
use crate::config::{EmbeddingsConfig, RerankingConfig};
use crate::text::tokenize;
use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{info, warn};

const PROVIDER: &str = "local";

/// Stub-mode output dimension when the config does not pin one.
pub const STUB_EMBEDDING_DIM: usize = 384;

fn select_device() -> Result<Device, ModelError> {
    #[cfg(feature = "cuda")]
    return Device::new_cuda(0).map_err(|e| ModelError::Inference {
        message: format!("failed to open CUDA device: {e}"),
    });

    #[cfg(all(feature = "metal", not(feature = "cuda")))]
    return Device::new_metal(0).map_err(|e| ModelError::Inference {
        message: format!("failed to open Metal device: {e}"),
    });

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    Ok(Device::Cpu)
}

fn model_dir_if_present(path: &str) -> Option<PathBuf> {
    let dir = PathBuf::from(path);
    if dir.is_dir() && dir.join("model.safetensors").is_file() {
        Some(dir)
    } else {
        None
    }
}

fn load_tokenizer(dir: &Path, max_len: usize) -> Result<Tokenizer, ModelError> {
    let mut tokenizer =
        Tokenizer::from_file(dir.join("tokenizer.json")).map_err(|e| ModelError::Inference {
            message: format!("failed to load tokenizer: {e}"),
        })?;
    let truncation = tokenizers::TruncationParams {
        max_length: max_len,
        ..Default::default()
    };
    tokenizer
        .with_truncation(Some(truncation))
        .map_err(|e| ModelError::Inference {
            message: format!("failed to configure truncation: {e}"),
        })?;
    Ok(tokenizer)
}

fn load_bert(
    dir: &Path,
    device: &Device,
    prefix: Option<&str>,
) -> Result<(BertModel, BertConfig, VarBuilder<'static>), ModelError> {
    let config_text =
        std::fs::read_to_string(dir.join("config.json")).map_err(|e| ModelError::Inference {
            message: format!("failed to read config.json: {e}"),
        })?;
    let config: BertConfig =
        serde_json::from_str(&config_text).map_err(|e| ModelError::Inference {
            message: format!("invalid config.json: {e}"),
        })?;

    // SAFETY: the safetensors file is mapped read-only and outlives the model.
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[dir.join("model.safetensors")], DTYPE, device)
    }
    .map_err(|e| ModelError::Inference {
        message: format!("failed to map model.safetensors: {e}"),
    })?;

    let encoder_vb = match prefix {
        Some(prefix) => vb.pp(prefix),
        None => vb.clone(),
    };
    let model = BertModel::load(encoder_vb, &config).map_err(|e| ModelError::Inference {
        message: format!("failed to load BERT weights: {e}"),
    })?;

    Ok((model, config, vb))
}

fn stub_vector(text: &str, dimensions: usize) -> Vec<f32> {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish();

    let mut vector = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        state = state.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
        vector.push(((state >> 33) as f32 / u32::MAX as f32) - 0.25);
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

struct EmbedderModel {
    bert: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

enum EmbedderBackend {
    Model(Arc<Mutex<EmbedderModel>>),
    Stub { dimensions: usize },
}

/// Mean-pooled BERT embedder with stub fallback.
pub struct LocalEmbedder {
    model_name: String,
    model_dir: Option<PathBuf>,
    max_length: usize,
    batch_size: usize,
    configured_dimensions: Option<usize>,
    backend: Mutex<Option<Arc<EmbedderBackendShared>>>,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
}

struct EmbedderBackendShared {
    backend: EmbedderBackend,
}

impl LocalEmbedder {
    /// Builds from the `embeddings` config section. `model` is treated as a
    /// local directory; a missing directory means stub mode.
    pub fn from_config(config: &EmbeddingsConfig) -> Self {
        Self {
            model_name: config.model.clone(),
            model_dir: model_dir_if_present(&config.model),
            max_length: config.max_length.min(512),
            batch_size: config.batch_size,
            configured_dimensions: config.dimensions,
            backend: Mutex::new(None),
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
        }
    }

    fn is_stub(&self) -> bool {
        self.model_dir.is_none()
    }

    fn backend(&self) -> Result<Arc<EmbedderBackendShared>, ModelError> {
        self.backend
            .lock()
            .clone()
            .ok_or_else(|| ModelError::NotInitialized {
                model: self.model_name.clone(),
            })
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ModelError> {
        let shared = self.backend()?;
        let max_length = self.max_length;

        match &shared.backend {
            EmbedderBackend::Stub { dimensions } => {
                let dimensions = *dimensions;
                Ok(texts
                    .iter()
                    .map(|t| stub_vector(truncate_chars(t, max_length), dimensions))
                    .collect())
            }
            EmbedderBackend::Model(model) => {
                let model = Arc::clone(model);
                tokio::task::spawn_blocking(move || {
                    let guard = model.lock();
                    texts
                        .iter()
                        .map(|text| embed_one(&guard, truncate_chars(text, max_length)))
                        .collect::<Result<Vec<_>, _>>()
                })
                .await
                .map_err(|e| ModelError::Inference {
                    message: format!("inference task panicked: {e}"),
                })?
            }
        }
    }
}

fn embed_one(model: &EmbedderModel, text: &str) -> Result<Vec<f32>, ModelError> {
    let encoding = model
        .tokenizer
        .encode(text, true)
        .map_err(|e| ModelError::Inference {
            message: format!("tokenization failed: {e}"),
        })?;

    let ids = encoding.get_ids();
    if ids.is_empty() {
        return Ok(vec![0.0; model.hidden_size]);
    }

    let inference = || -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &model.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = model.bert.forward(&input_ids, &token_type_ids, None)?;
        // Mean pooling over the sequence dimension.
        let (_batch, seq_len, _hidden) = hidden.dims3()?;
        let pooled = (hidden.sum(1)? / (seq_len as f64))?;
        pooled.squeeze(0)?.to_vec1::<f32>()
    };

    let mut vector = inference().map_err(|e| ModelError::Inference {
        message: format!("BERT forward pass failed: {e}"),
    })?;

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    Ok(vector)
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle
            .initialize(|| async {
                let backend = match &self.model_dir {
                    None => {
                        warn!(
                            model = %self.model_name,
                            "local embedder model directory missing, running in stub mode"
                        );
                        EmbedderBackend::Stub {
                            dimensions: self.configured_dimensions.unwrap_or(STUB_EMBEDDING_DIM),
                        }
                    }
                    Some(dir) => {
                        let dir = dir.clone();
                        let max_length = self.max_length;
                        let loaded = tokio::task::spawn_blocking(move || {
                            let device = select_device()?;
                            let (bert, config, _vb) = load_bert(&dir, &device, None)?;
                            let tokenizer = load_tokenizer(&dir, max_length)?;
                            Ok::<_, ModelError>(EmbedderModel {
                                bert,
                                tokenizer,
                                device,
                                hidden_size: config.hidden_size,
                            })
                        })
                        .await
                        .map_err(|e| ModelError::Inference {
                            message: format!("model load task panicked: {e}"),
                        })??;

                        info!(
                            model = %self.model_name,
                            hidden_size = loaded.hidden_size,
                            "local embedder loaded"
                        );
                        EmbedderBackend::Model(Arc::new(Mutex::new(loaded)))
                    }
                };

                *self.backend.lock() = Some(Arc::new(EmbedderBackendShared { backend }));
                Ok(())
            })
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.lifecycle.ensure_ready(&self.model_name).await?;
        require_non_empty("query text", text)?;

        let start = Instant::now();
        match self.embed_texts(vec![text.to_string()]).await {
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
        self.lifecycle.ensure_ready(&self.model_name).await?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            require_non_empty("batch text", text)?;
        }

        let start = Instant::now();
        match self.embed_texts(texts.to_vec()).await {
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
        *self.backend.lock() = None;
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if !self.lifecycle.is_loaded() {
            return HealthReport::unhealthy("not initialized");
        }
        let mut report = HealthReport::healthy(self.dimensions());
        if self.is_stub() {
            report.status = HealthStatus::Degraded;
            report.message = Some("running in stub mode (no model files)".to_string());
        }
        report
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn dimensions(&self) -> Option<usize> {
        if self.is_stub() {
            Some(self.configured_dimensions.unwrap_or(STUB_EMBEDDING_DIM))
        } else {
            self.configured_dimensions
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

struct RerankerModel {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

enum RerankerBackend {
    Model(Arc<Mutex<RerankerModel>>),
    Stub,
}

/// Cross-encoder reranker with stub fallback.
pub struct LocalReranker {
    model_name: String,
    model_dir: Option<PathBuf>,
    max_length: usize,
    batch_size: usize,
    backend: Mutex<Option<Arc<RerankerBackendShared>>>,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
}

struct RerankerBackendShared {
    backend: RerankerBackend,
}

impl LocalReranker {
    /// Builds from the `reranking` config section. `model_cache_dir` (or
    /// `model` as a path) locates the checkpoint; absence means stub mode.
    pub fn from_config(config: &RerankingConfig) -> Self {
        let model_dir = config
            .model_cache_dir
            .as_deref()
            .and_then(model_dir_if_present)
            .or_else(|| model_dir_if_present(&config.model));

        Self {
            model_name: config.model.clone(),
            model_dir,
            max_length: config.max_length.min(512),
            batch_size: config.batch_size,
            backend: Mutex::new(None),
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
        }
    }

    fn is_stub(&self) -> bool {
        self.model_dir.is_none()
    }

    fn backend(&self) -> Result<Arc<RerankerBackendShared>, ModelError> {
        self.backend
            .lock()
            .clone()
            .ok_or_else(|| ModelError::NotInitialized {
                model: self.model_name.clone(),
            })
    }

    fn stub_score(query: &str, document: &str) -> f32 {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens: HashSet<String> = tokenize(document).into_iter().collect();
        query_tokens.intersection(&doc_tokens).count() as f32 / query_tokens.len() as f32
    }
}

fn score_pair(model: &RerankerModel, query: &str, document: &str) -> Result<f32, ModelError> {
    let encoding = model
        .tokenizer
        .encode((query, document), true)
        .map_err(|e| ModelError::Inference {
            message: format!("tokenization failed: {e}"),
        })?;

    let inference = || -> candle_core::Result<f32> {
        let input_ids = Tensor::new(encoding.get_ids(), &model.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &model.device)?.unsqueeze(0)?;
        let hidden = model.bert.forward(&input_ids, &token_type_ids, None)?;
        // BertForSequenceClassification: pooler(tanh) over [CLS], then the
        // classification head.
        let cls = hidden.i((.., 0, ..))?;
        let pooled = model.pooler.forward(&cls)?.tanh()?;
        let logits = model.classifier.forward(&pooled)?;
        let logit = logits.flatten_all()?.to_vec1::<f32>()?[0];
        // Sigmoid so scores land in [0, 1] like the remote rerankers.
        Ok(1.0 / (1.0 + (-logit).exp()))
    };

    inference().map_err(|e| ModelError::Inference {
        message: format!("cross-encoder forward pass failed: {e}"),
    })
}

#[async_trait]
impl Reranker for LocalReranker {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle
            .initialize(|| async {
                let backend = match &self.model_dir {
                    None => {
                        warn!(
                            model = %self.model_name,
                            "local reranker model directory missing, running in stub mode"
                        );
                        RerankerBackend::Stub
                    }
                    Some(dir) => {
                        let dir = dir.clone();
                        let max_length = self.max_length;
                        let loaded = tokio::task::spawn_blocking(move || {
                            let device = select_device()?;
                            let (bert, config, vb) = load_bert(&dir, &device, Some("bert"))?;
                            let pooler = candle_nn::linear(
                                config.hidden_size,
                                config.hidden_size,
                                vb.pp("bert.pooler.dense"),
                            )
                            .map_err(|e| ModelError::Inference {
                                message: format!("failed to load pooler head: {e}"),
                            })?;
                            let classifier = candle_nn::linear(
                                config.hidden_size,
                                1,
                                vb.pp("classifier"),
                            )
                            .map_err(|e| ModelError::Inference {
                                message: format!("failed to load classifier head: {e}"),
                            })?;
                            let tokenizer = load_tokenizer(&dir, max_length)?;
                            Ok::<_, ModelError>(RerankerModel {
                                bert,
                                pooler,
                                classifier,
                                tokenizer,
                                device,
                            })
                        })
                        .await
                        .map_err(|e| ModelError::Inference {
                            message: format!("model load task panicked: {e}"),
                        })??;

                        info!(model = %self.model_name, "local reranker loaded");
                        RerankerBackend::Model(Arc::new(Mutex::new(loaded)))
                    }
                };

                *self.backend.lock() = Some(Arc::new(RerankerBackendShared { backend }));
                Ok(())
            })
            .await
    }

    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError> {
        self.lifecycle.ensure_ready(&self.model_name).await?;
        require_non_empty("query text", query)?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let shared = self.backend()?;
        let query = truncate_chars(query, self.max_length).to_string();
        let documents: Vec<String> = documents
            .iter()
            .map(|d| truncate_chars(d, self.max_length).to_string())
            .collect();

        let result = match &shared.backend {
            RerankerBackend::Stub => Ok(documents
                .iter()
                .map(|doc| Self::stub_score(&query, doc))
                .collect()),
            RerankerBackend::Model(model) => {
                let model = Arc::clone(model);
                tokio::task::spawn_blocking(move || {
                    let guard = model.lock();
                    documents
                        .iter()
                        .map(|doc| score_pair(&guard, &query, doc))
                        .collect::<Result<Vec<_>, _>>()
                })
                .await
                .map_err(|e| ModelError::Inference {
                    message: format!("inference task panicked: {e}"),
                })?
            }
        };

        match result {
            Ok(scores) => {
                self.metrics
                    .record_success(start.elapsed(), scores.len() as u64);
                Ok(scores)
            }
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                Err(e)
            }
        }
    }

    async fn rerank_batch(
        &self,
        queries: &[String],
        documents: &[Vec<String>],
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        if queries.len() != documents.len() {
            return Err(ModelError::InvalidInput {
                message: format!(
                    "rerank_batch got {} queries but {} document lists",
                    queries.len(),
                    documents.len()
                ),
            });
        }

        let mut all = Vec::with_capacity(queries.len());
        for (query, docs) in queries.iter().zip(documents) {
            all.push(self.rerank(query, docs).await?);
        }
        Ok(all)
    }

    async fn cleanup(&self) -> Result<(), ModelError> {
        *self.backend.lock() = None;
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if !self.lifecycle.is_loaded() {
            return HealthReport::unhealthy("not initialized");
        }
        let mut report = HealthReport::healthy(None);
        if self.is_stub() {
            report.status = HealthStatus::Degraded;
            report.message = Some("running in stub mode (no model files)".to_string());
        }
        report
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}
