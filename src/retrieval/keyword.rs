//! Lexical scoring over a candidate pool.
//!
//! Token overlap weighted by inverse document frequency, computed over the
//! candidates of one search (not a global corpus). Scores are normalized
//! into `[0, 1]` by the best score a candidate containing every query
//! token would get.

use crate::text::tokenize;
use crate::vectorstore::SearchResult;
use std::collections::{HashMap, HashSet};

/// Scores each candidate against the query, aligned with input order.
pub fn lexical_scores(query: &str, candidates: &[SearchResult]) -> Vec<f32> {
    let query_tokens: Vec<String> = {
        let mut seen = HashSet::new();
        tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    };

    if query_tokens.is_empty() || candidates.is_empty() {
        return vec![0.0; candidates.len()];
    }

    let token_sets: Vec<HashSet<String>> = candidates
        .iter()
        .map(|c| tokenize(&c.content).into_iter().collect())
        .collect();

    // Document frequency of each query token within the pool.
    let pool_size = candidates.len() as f32;
    let mut idf: HashMap<&str, f32> = HashMap::with_capacity(query_tokens.len());
    for token in &query_tokens {
        let df = token_sets.iter().filter(|set| set.contains(token)).count() as f32;
        idf.insert(token.as_str(), (1.0 + pool_size / (1.0 + df)).ln());
    }

    let max_score: f32 = idf.values().sum();
    if max_score <= 0.0 {
        return vec![0.0; candidates.len()];
    }

    token_sets
        .iter()
        .map(|set| {
            let raw: f32 = query_tokens
                .iter()
                .filter(|t| set.contains(t.as_str()))
                .map(|t| idf[t.as_str()])
                .sum();
            raw / max_score
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use uuid::Uuid;

    fn candidate(content: &str) -> SearchResult {
        SearchResult {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: content.to_string(),
            similarity_score: 0.5,
            metadata: Map::new(),
        }
    }

    #[test]
    fn full_overlap_scores_highest() {
        let candidates = vec![
            candidate("neural networks"),
            candidate("the weather today"),
            candidate("machine learning uses neural networks"),
        ];
        let scores = lexical_scores("neural networks", &candidates);

        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert_eq!(scores[1], 0.0);
        assert!((scores[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rare_tokens_outweigh_common_ones() {
        let candidates = vec![
            candidate("alpha beta"),
            candidate("alpha gamma"),
            candidate("alpha delta"),
        ];
        // "beta" appears in one candidate, "alpha" in all three: the
        // candidate holding the rare token must outrank alpha-only ones.
        let scores = lexical_scores("alpha beta", &candidates);
        assert!(scores[0] > scores[1]);
        assert!((scores[1] - scores[2]).abs() < 1e-6);
    }

    #[test]
    fn empty_query_or_pool_yields_zeroes() {
        assert!(lexical_scores("", &[candidate("a")])
            .iter()
            .all(|&s| s == 0.0));
        assert!(lexical_scores("query", &[]).is_empty());
    }

    #[test]
    fn cjk_queries_match_by_unigram() {
        let candidates = vec![candidate("机器学习很有用"), candidate("天气很好")];
        let scores = lexical_scores("机器学习", &candidates);
        assert!(scores[0] > scores[1]);
    }
}
