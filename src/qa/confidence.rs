//! Answer confidence scoring.
//!
//! `confidence = w1 · mean(top-3 source similarities)
//!             + w2 · min(sources / 5, 1)
//!             + w3 · min(answer_chars / 200, 1)`
//!
//! with weights (0.6, 0.25, 0.15), clamped into `[0, 1]`.

use crate::storage::SourceAttribution;

const SIMILARITY_WEIGHT: f32 = 0.6;
const SOURCE_COUNT_WEIGHT: f32 = 0.25;
const LENGTH_WEIGHT: f32 = 0.15;

const SOURCE_COUNT_SATURATION: f32 = 5.0;
const LENGTH_SATURATION: f32 = 200.0;

/// Scores an answer against its sources.
pub fn confidence_score(sources: &[SourceAttribution], answer: &str) -> f32 {
    if sources.is_empty() {
        return 0.0;
    }

    let top3: Vec<f32> = {
        let mut similarities: Vec<f32> = sources.iter().map(|s| s.similarity_score).collect();
        similarities.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        similarities.truncate(3);
        similarities
    };
    let similarity_factor = top3.iter().sum::<f32>() / top3.len() as f32;

    let source_count_factor = (sources.len() as f32 / SOURCE_COUNT_SATURATION).min(1.0);
    let length_factor = (answer.chars().count() as f32 / LENGTH_SATURATION).min(1.0);

    (SIMILARITY_WEIGHT * similarity_factor
        + SOURCE_COUNT_WEIGHT * source_count_factor
        + LENGTH_WEIGHT * length_factor)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn source(similarity: f32) -> SourceAttribution {
        SourceAttribution {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            document_name: "d.txt".to_string(),
            similarity_score: similarity,
            content_preview: String::new(),
            rerank_score: None,
        }
    }

    #[test]
    fn no_sources_means_zero_confidence() {
        assert_eq!(confidence_score(&[], "long answer"), 0.0);
    }

    #[test]
    fn stays_within_unit_range() {
        let sources: Vec<_> = (0..10).map(|_| source(1.0)).collect();
        let score = confidence_score(&sources, &"a".repeat(1000));
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn only_the_top_three_similarities_count() {
        // Three strong sources plus weak tail: the tail affects only the
        // count factor, not the similarity mean.
        let strong = vec![source(0.9), source(0.9), source(0.9)];
        let with_tail = {
            let mut v = strong.clone();
            v.push(source(0.1));
            v.push(source(0.1));
            v
        };

        let answer = "a".repeat(200);
        let base = confidence_score(&strong, &answer);
        let tailed = confidence_score(&with_tail, &answer);

        // 0.6 * 0.9 is shared; the tail only raises the count factor from
        // 3/5 to 5/5.
        assert!((tailed - base - SOURCE_COUNT_WEIGHT * (1.0 - 0.6)).abs() < 1e-6);
    }

    #[test]
    fn longer_answers_score_higher_up_to_saturation() {
        let sources = vec![source(0.8)];
        let short = confidence_score(&sources, "brief");
        let long = confidence_score(&sources, &"a".repeat(200));
        let longer = confidence_score(&sources, &"a".repeat(2000));

        assert!(long > short);
        assert!((long - longer).abs() < 1e-6);
    }

    #[test]
    fn strong_single_source_clears_half_confidence() {
        let sources = vec![source(0.95)];
        let score = confidence_score(&sources, &"detailed answer ".repeat(20));
        assert!(score >= 0.5);
    }
}
