//! Retrieval engine counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for the retrieval engine.
#[derive(Debug, Default)]
pub struct RetrievalStats {
    semantic_searches: AtomicU64,
    keyword_searches: AtomicU64,
    hybrid_searches: AtomicU64,
    total_latency_ms: AtomicU64,
    rerank_invocations: AtomicU64,
    rerank_failures: AtomicU64,
    cache_hits: AtomicU64,
}

impl RetrievalStats {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_search(&self, mode: crate::config::SearchMode, latency: Duration) {
        let counter = match mode {
            crate::config::SearchMode::Semantic => &self.semantic_searches,
            crate::config::SearchMode::Keyword => &self.keyword_searches,
            crate::config::SearchMode::Hybrid => &self.hybrid_searches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rerank_success(&self) {
        self.rerank_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rerank_failure(&self) {
        self.rerank_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> RetrievalStatsSnapshot {
        let semantic = self.semantic_searches.load(Ordering::Relaxed);
        let keyword = self.keyword_searches.load(Ordering::Relaxed);
        let hybrid = self.hybrid_searches.load(Ordering::Relaxed);
        let total = semantic + keyword + hybrid;
        let latency = self.total_latency_ms.load(Ordering::Relaxed);

        RetrievalStatsSnapshot {
            total_searches: total,
            semantic_searches: semantic,
            keyword_searches: keyword,
            hybrid_searches: hybrid,
            avg_latency_ms: if total == 0 {
                0.0
            } else {
                latency as f64 / total as f64
            },
            rerank_invocations: self.rerank_invocations.load(Ordering::Relaxed),
            rerank_failures: self.rerank_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`RetrievalStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalStatsSnapshot {
    pub total_searches: u64,
    pub semantic_searches: u64,
    pub keyword_searches: u64,
    pub hybrid_searches: u64,
    pub avg_latency_ms: f64,
    pub rerank_invocations: u64,
    pub rerank_failures: u64,
    pub cache_hits: u64,
}
