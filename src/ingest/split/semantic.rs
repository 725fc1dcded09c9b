//! Sentence-grouping splitter with discourse-marker boundaries.

use super::super::chunk::{ChunkMetadata, SplitConfig, TextChunk};
use super::super::error::ProcessingError;
use super::{Splitter, clean_text, make_chunk};
use crate::text::split_sentences;
use uuid::Uuid;

/// Markers that open a new topic when a sentence starts with them.
const TOPIC_MARKERS: &[&str] = &[
    "然而", "但是", "不过", "另外", "此外", "另一方面", "相反", "与此同时", "接下来", "首先",
    "其次", "最后", "however", "but", "on the other hand", "meanwhile", "next",
];

/// Markers that signal a time shift anywhere in the sentence.
const TIME_MARKERS: &[&str] = &["后来", "然后", "接着", "随后", "later", "then", "afterwards"];

/// Sentences shorter than this are treated as noise and skipped.
const MIN_SENTENCE_CHARS: usize = 10;

/// Groups sentences greedily up to `chunk_size`, starting a new group on
/// discourse markers; groups overlap by one sentence when overlap is
/// configured.
pub struct SemanticSplitter {
    config: SplitConfig,
}

impl SemanticSplitter {
    /// A semantic splitter over `config`.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    fn usable_sentences(text: &str) -> Vec<String> {
        split_sentences(text)
            .into_iter()
            .map(|s| {
                s.trim_end_matches(crate::text::is_sentence_terminator)
                    .trim()
                    .to_string()
            })
            .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
            .collect()
    }

    fn breaks_topic(sentence: &str) -> bool {
        let lowered = sentence.to_lowercase();
        TOPIC_MARKERS
            .iter()
            .any(|marker| lowered.starts_with(marker))
            || TIME_MARKERS.iter().any(|marker| lowered.contains(marker))
    }

    fn group_metadata(sentence_count: usize, group: usize) -> ChunkMetadata {
        let mut metadata = ChunkMetadata::for_strategy("SemanticSplitter", "semantic", 0);
        metadata.sentence_count = Some(sentence_count);
        metadata.semantic_group = Some(group);
        metadata
    }
}

impl Splitter for SemanticSplitter {
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyText);
        }

        let text = clean_text(text);
        let sentences = Self::usable_sentences(&text);

        if sentences.len() <= 1 {
            let mut metadata = Self::group_metadata(sentences.len().max(1), 0);
            metadata.semantic_group = None;
            return Ok(vec![make_chunk(
                &self.config,
                &text,
                document_id,
                0,
                metadata,
            )?]);
        }

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        let mut group: Vec<String> = Vec::new();
        let mut group_len = 0usize;

        let flush = |group: &[String],
                     chunk_index: usize,
                     chunks: &mut Vec<TextChunk>,
                     config: &SplitConfig|
         -> Result<(), ProcessingError> {
            let content = format!("{}.", group.join(". "));
            chunks.push(make_chunk(
                config,
                &content,
                document_id,
                chunk_index,
                Self::group_metadata(group.len(), chunk_index),
            )?);
            Ok(())
        };

        for sentence in sentences {
            let sentence_len = sentence.chars().count();
            let should_break = !group.is_empty()
                && (group_len + sentence_len > self.config.chunk_size
                    || Self::breaks_topic(&sentence));

            if should_break {
                flush(&group, chunk_index, &mut chunks, &self.config)?;
                chunk_index += 1;

                if self.config.chunk_overlap > 0 {
                    // One sentence of carry-over keeps local context.
                    let carried = group.pop();
                    group.clear();
                    if let Some(carried) = carried {
                        group.push(carried);
                    }
                } else {
                    group.clear();
                }
                group.push(sentence);
                group_len = group.iter().map(|s| s.chars().count()).sum();
            } else {
                group_len += sentence_len;
                group.push(sentence);
            }
        }

        if !group.is_empty() {
            flush(&group, chunk_index, &mut chunks, &self.config)?;
        }

        Ok(chunks)
    }
}
