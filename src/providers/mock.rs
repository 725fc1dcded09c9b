//! Deterministic in-process providers.
//!
//! The mock embedder hashes tokens into a fixed number of slots, so texts
//! sharing vocabulary get correlated vectors — enough signal for retrieval
//! ordering to be meaningful in tests. The mock reranker scores by token
//! overlap; the mock generator extracts the best-matching context sentence.

use super::error::ModelError;
use super::lifecycle::LifecycleCell;
use super::metrics::{MetricsSnapshot, ProviderMetrics};
use super::{
    Embedder, GenerationOutput, GenerationRequest, Generator, HealthReport, Reranker,
    require_non_empty, truncate_chars,
};
use crate::text::{split_sentences, tokenize};
use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const PROVIDER: &str = "mock";

/// Default output dimension of [`MockEmbedder`].
pub const MOCK_EMBEDDING_DIM: usize = 384;

fn slot_of(token: &str, dimensions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % dimensions as u64) as usize
}

/// Token-hashing embedder.
pub struct MockEmbedder {
    model: String,
    dimensions: usize,
    max_length: usize,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
    fail_requests: AtomicBool,
}

impl MockEmbedder {
    /// Embedder with the default dimension.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_dimensions(model, MOCK_EMBEDDING_DIM)
    }

    /// Embedder with an explicit dimension.
    pub fn with_dimensions(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
            max_length: 8000,
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
            fail_requests: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent operation fail (for error-path tests).
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::Relaxed);
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(truncate_chars(text, self.max_length)) {
            vector[slot_of(&token, self.dimensions)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn check_forced_failure(&self) -> Result<(), ModelError> {
        if self.fail_requests.load(Ordering::Relaxed) {
            Err(ModelError::Inference {
                message: "mock embedder forced failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle.initialize(|| async { Ok(()) }).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        require_non_empty("query text", text)?;

        let start = Instant::now();
        if let Err(e) = self.check_forced_failure() {
            self.metrics.record_failure(start.elapsed());
            return Err(e);
        }
        let vector = self.embed_text(text);
        self.metrics.record_success(start.elapsed(), 1);
        Ok(vector)
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
        if let Err(e) = self.check_forced_failure() {
            self.metrics.record_failure(start.elapsed());
            return Err(e);
        }
        let vectors = texts.iter().map(|t| self.embed_text(t)).collect();
        self.metrics
            .record_success(start.elapsed(), texts.len() as u64);
        Ok(vectors)
    }

    async fn cleanup(&self) -> Result<(), ModelError> {
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if self.lifecycle.is_loaded() {
            HealthReport::healthy(Some(self.dimensions))
        } else {
            HealthReport::unhealthy("mock embedder not initialized")
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
        Some(self.dimensions)
    }

    fn batch_size(&self) -> usize {
        64
    }
}

/// Token-overlap reranker.
pub struct MockReranker {
    model: String,
    max_length: usize,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
    fail_requests: AtomicBool,
}

impl MockReranker {
    /// A reranker that scores by token overlap.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_length: 512,
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
            fail_requests: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent rerank call fail (for fallback tests).
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::Relaxed);
    }

    fn score_pair(&self, query_tokens: &HashSet<String>, document: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens: HashSet<String> =
            tokenize(truncate_chars(document, self.max_length)).into_iter().collect();
        let shared = query_tokens.intersection(&doc_tokens).count();
        shared as f32 / query_tokens.len() as f32
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle.initialize(|| async { Ok(()) }).await
    }

    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        require_non_empty("query text", query)?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        if self.fail_requests.load(Ordering::Relaxed) {
            self.metrics.record_failure(start.elapsed());
            return Err(ModelError::Inference {
                message: "mock reranker forced failure".to_string(),
            });
        }

        let query_tokens: HashSet<String> =
            tokenize(truncate_chars(query, self.max_length)).into_iter().collect();
        let scores = documents
            .iter()
            .map(|doc| self.score_pair(&query_tokens, doc))
            .collect();

        self.metrics
            .record_success(start.elapsed(), documents.len() as u64);
        Ok(scores)
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
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if self.fail_requests.load(Ordering::Relaxed) {
            return HealthReport::unhealthy("mock reranker forced failure");
        }
        if self.lifecycle.is_loaded() {
            HealthReport::healthy(None)
        } else {
            HealthReport::unhealthy("mock reranker not initialized")
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

    fn batch_size(&self) -> usize {
        32
    }
}

/// Extractive generator: answers with the context sentence that best
/// matches the question.
pub struct MockGenerator {
    model: String,
    lifecycle: LifecycleCell,
    metrics: ProviderMetrics,
    fail_requests: AtomicBool,
}

/// Fixed reply when the prompt carries no usable context.
pub const MOCK_NO_ANSWER: &str = "The information is not available in the provided sources.";

impl MockGenerator {
    /// A generator that extracts from the prompt.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            lifecycle: LifecycleCell::new(),
            metrics: ProviderMetrics::new(),
            fail_requests: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent generate call fail (for degraded-path tests).
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::Relaxed);
    }

    fn extract_answer(prompt: &str) -> String {
        // The first sentence is treated as the question, the rest as
        // candidate context.
        let sentences = split_sentences(prompt);
        let Some((question, context)) = sentences.split_first() else {
            return MOCK_NO_ANSWER.to_string();
        };

        let question_tokens: HashSet<String> = tokenize(question).into_iter().collect();
        let best = context
            .iter()
            .map(|sentence| {
                let tokens: HashSet<String> = tokenize(sentence).into_iter().collect();
                let shared = question_tokens.intersection(&tokens).count();
                (shared, sentence)
            })
            .max_by_key(|(shared, _)| *shared);

        match best {
            Some((shared, sentence)) if shared > 0 => sentence.clone(),
            _ => MOCK_NO_ANSWER.to_string(),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn initialize(&self) -> Result<(), ModelError> {
        self.lifecycle.initialize(|| async { Ok(()) }).await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, ModelError> {
        self.lifecycle.ensure_ready(&self.model).await?;
        require_non_empty("prompt", &request.prompt)?;

        let start = Instant::now();
        if self.fail_requests.load(Ordering::Relaxed) {
            self.metrics.record_failure(start.elapsed());
            return Err(ModelError::Inference {
                message: "mock generator forced failure".to_string(),
            });
        }

        let text = Self::extract_answer(&request.prompt);
        let completion_tokens = text.split_whitespace().count() as u32;
        self.metrics
            .record_success(start.elapsed(), completion_tokens as u64);

        Ok(GenerationOutput {
            text,
            prompt_tokens: Some(request.prompt.split_whitespace().count() as u32),
            completion_tokens: Some(completion_tokens),
        })
    }

    async fn cleanup(&self) -> Result<(), ModelError> {
        self.lifecycle.reset().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        if self.fail_requests.load(Ordering::Relaxed) {
            return HealthReport::unhealthy("mock generator forced failure");
        }
        if self.lifecycle.is_loaded() {
            HealthReport::healthy(None)
        } else {
            HealthReport::unhealthy("mock generator not initialized")
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
