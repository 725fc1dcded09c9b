//! Retrieval engine.
//!
//! One public operation: [`RetrievalEngine::search_with_config`]. The query
//! is embedded, the vector store is over-fetched (`top_k × 3` when
//! reranking so the reranker has candidates), the configured mode reshapes
//! the scores, the active reranker optionally re-orders, and the list is
//! truncated to `top_k`.
//!
//! A reranker that cannot initialize or errors mid-call is non-fatal: the
//! un-reranked ordering is returned, a warning is logged, and the failure
//! is counted. A primary-search failure is fatal to the request.

pub mod error;
pub mod keyword;
pub mod stats;

#[cfg(test)]
mod tests;

pub use error::RetrievalError;
pub use keyword::lexical_scores;
pub use stats::{RetrievalStats, RetrievalStatsSnapshot};

use crate::config::{RetrievalConfig, SearchMode};
use crate::registry::RegistryHandle;
use crate::vectorstore::{META_RERANK_SCORE, SearchResult, VectorStoreHandle, clamp_score};
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Over-fetch multiplier applied when reranking is enabled.
const RERANK_OVERFETCH: usize = 3;

/// Cached query results live this long.
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 1024;

/// Embeds queries and shapes vector-store hits per the live config.
pub struct RetrievalEngine {
    vectors: VectorStoreHandle,
    registry: RegistryHandle,
    stats: RetrievalStats,
    cache: Cache<String, Arc<Vec<SearchResult>>>,
}

impl RetrievalEngine {
    /// Wires the engine to its collaborators.
    pub fn new(vectors: VectorStoreHandle, registry: RegistryHandle) -> Self {
        Self {
            vectors,
            registry,
            stats: RetrievalStats::new(),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Current counter snapshot.
    pub fn stats(&self) -> RetrievalStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs one search under `config`.
    #[instrument(skip(self, config), fields(mode = %config.search_mode, top_k = config.top_k))]
    pub async fn search_with_config(
        &self,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if config.top_k == 0 {
            return Ok(Vec::new());
        }

        let cache_key = cache_key(query, config);
        if config.enable_cache {
            if let Some(cached) = self.cache.get(&cache_key).await {
                self.stats.record_cache_hit();
                debug!("retrieval cache hit");
                return Ok(cached.as_ref().clone());
            }
        }

        let start = Instant::now();

        let embedder = self.registry.active_embedder();
        embedder.initialize().await?;
        let query_vector = embedder.embed_query(query).await?;

        let fetch_k = if config.enable_rerank {
            config.top_k * RERANK_OVERFETCH
        } else {
            config.top_k
        };

        let mut results = self
            .vectors
            .search_similar(&query_vector, fetch_k, config.similarity_threshold, None)
            .await?;

        match config.search_mode {
            SearchMode::Semantic => {}
            SearchMode::Keyword => {
                let scores = lexical_scores(query, &results);
                for (result, score) in results.iter_mut().zip(scores) {
                    result.similarity_score = clamp_score(score);
                }
                sort_by_similarity(&mut results);
            }
            SearchMode::Hybrid => {
                let alpha = config.hybrid_alpha;
                let scores = lexical_scores(query, &results);
                for (result, lexical) in results.iter_mut().zip(scores) {
                    result.similarity_score =
                        clamp_score(alpha * result.similarity_score + (1.0 - alpha) * lexical);
                }
                sort_by_similarity(&mut results);
            }
        }

        if config.enable_rerank && !results.is_empty() {
            self.apply_rerank(query, &mut results).await;
        }

        results.truncate(config.top_k);
        self.stats.record_search(config.search_mode, start.elapsed());

        if config.enable_cache {
            self.cache
                .insert(cache_key, Arc::new(results.clone()))
                .await;
        }

        Ok(results)
    }

    /// Scores `(query, content)` pairs with the active reranker and
    /// re-sorts. Any failure leaves the current ordering in place.
    async fn apply_rerank(&self, query: &str, results: &mut Vec<SearchResult>) {
        let reranker = self.registry.active_reranker();
        if let Err(e) = reranker.initialize().await {
            warn!(error = %e, "reranker unavailable, keeping original ordering");
            self.stats.record_rerank_failure();
            return;
        }

        let batch_size = reranker.batch_size().max(1);
        let mut scores: Vec<f32> = Vec::with_capacity(results.len());

        for batch in results.chunks(batch_size) {
            let documents: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            match reranker.rerank(query, &documents).await {
                Ok(batch_scores) => scores.extend(batch_scores),
                Err(e) => {
                    warn!(error = %e, "reranking failed, keeping original ordering");
                    self.stats.record_rerank_failure();
                    return;
                }
            }
        }

        for (result, score) in results.iter_mut().zip(&scores) {
            result.metadata.insert(
                META_RERANK_SCORE.to_string(),
                serde_json::Value::from(*score as f64),
            );
        }
        results.sort_by(|a, b| {
            let a_score = a.rerank_score().unwrap_or(f32::MIN);
            let b_score = b.rerank_score().unwrap_or(f32::MIN);
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.stats.record_rerank_success();
    }
}

fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn cache_key(query: &str, config: &RetrievalConfig) -> String {
    format!(
        "{query}\u{1}{}\u{1}{}\u{1}{}\u{1}{}\u{1}{}",
        config.search_mode,
        config.top_k,
        config.similarity_threshold,
        config.enable_rerank,
        config.hybrid_alpha
    )
}
