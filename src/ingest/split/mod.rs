//! Document splitting strategies.
//!
//! [`RecursiveSplitter`] picks a strategy per document:
//!
//! - `hierarchical` for long texts with numbered-chapter titles,
//! - `structure` for texts with headers and enough paragraphs,
//! - `semantic` when enabled and the text is long enough,
//! - `fixed` otherwise,
//!
//! then post-processes: oversized chunks are re-split with the fixed-size
//! strategy (children tagged with their parent chunk id), undersized chunks
//! merge into their predecessor when the result stays within bounds, and
//! the final `chunk_index` sequence is re-densified from zero.

pub mod fixed;
pub mod hierarchical;
pub mod semantic;
pub mod structure;

#[cfg(test)]
mod tests;

pub use fixed::FixedSizeSplitter;
pub use hierarchical::HierarchicalSplitter;
pub use semantic::SemanticSplitter;
pub use structure::StructureSplitter;

use super::chunk::{ChunkMetadata, SplitConfig, TextChunk};
use super::error::ProcessingError;
use crate::text::split_sentences;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) static MD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+").expect("header regex"));
pub(crate) static NUMBERED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9一二三四五六七八九十]+[.、]\s*").expect("numbered regex"));
pub(crate) static CJK_CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第[0-9一二三四五六七八九十]+[章节部分]").expect("chapter regex")
});
pub(crate) static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));
static ANY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+|^[0-9]+\.\s+").expect("any-header regex"));

/// A strategy that turns one document's text into chunks.
pub trait Splitter {
    /// Splits `text` into indexed chunks for `document_id`.
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError>;
}

/// Normalizes whitespace the way every strategy expects: single spaces
/// within lines, trimmed line edges, at most one blank line in a row.
pub(crate) fn clean_text(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }
    out.join("\n").trim().to_string()
}

/// Builds a chunk, enforcing non-empty trimmed content and filling the
/// shared metadata plus any configured derived fields.
pub(crate) fn make_chunk(
    config: &SplitConfig,
    content: &str,
    document_id: Uuid,
    chunk_index: usize,
    mut metadata: ChunkMetadata,
) -> Result<TextChunk, ProcessingError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ProcessingError::EmptyChunk);
    }

    metadata.length = content.chars().count();
    if config.generate_summary {
        metadata.summary = Some(derive_summary(content));
    }
    if config.generate_questions {
        metadata.questions = Some(derive_questions(content));
    }

    Ok(TextChunk {
        id: Uuid::new_v4(),
        document_id,
        chunk_index,
        content: content.to_string(),
        metadata,
    })
}

/// First two sentences, elided, or the content itself when already short.
pub(crate) fn derive_summary(content: &str) -> String {
    if content.chars().count() <= 100 {
        return content.to_string();
    }

    let sentences = split_sentences(content);
    let summary = sentences
        .iter()
        .take(2)
        .map(|s| s.trim_end_matches(crate::text::is_sentence_terminator))
        .collect::<Vec<_>>()
        .join(". ");

    if summary.is_empty() {
        let head: String = content.chars().take(100).collect();
        format!("{head}...")
    } else {
        format!("{summary}...")
    }
}

/// Keyword-triggered probe questions, capped at three.
pub(crate) fn derive_questions(content: &str) -> Vec<String> {
    let mut questions = Vec::new();

    if content.contains("什么") || content.contains("what") || content.contains("What") {
        questions.push("What is this passage mainly about?".to_string());
    }
    if content.contains("如何") || content.contains("怎么") || content.contains("how ") {
        questions.push("How does the process described here work?".to_string());
    }
    if content.contains("为什么") || content.contains("原因") || content.contains("why ") {
        questions.push("What reasons does this passage give?".to_string());
    }

    if questions.is_empty() {
        questions.push("What is the key information in this passage?".to_string());
    }
    questions.truncate(3);
    questions
}

/// Strategy keys used in metadata and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fixed,
    Structure,
    Hierarchical,
    Semantic,
}

impl Strategy {
    fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fixed => "fixed",
            Strategy::Structure => "structure",
            Strategy::Hierarchical => "hierarchical",
            Strategy::Semantic => "semantic",
        }
    }
}

/// Strategy-selecting splitter with size post-processing.
pub struct RecursiveSplitter {
    config: SplitConfig,
    fixed: FixedSizeSplitter,
    structure: StructureSplitter,
    hierarchical: HierarchicalSplitter,
    semantic: SemanticSplitter,
}

impl RecursiveSplitter {
    /// A splitter bundle sharing one configuration.
    pub fn new(config: SplitConfig) -> Self {
        Self {
            fixed: FixedSizeSplitter::new(config.clone()),
            structure: StructureSplitter::new(config.clone()),
            hierarchical: HierarchicalSplitter::new(config.clone()),
            semantic: SemanticSplitter::new(config.clone()),
            config,
        }
    }

    /// Picks the strategy the text's shape calls for.
    pub fn select_strategy(&self, text: &str) -> Strategy {
        let length = text.chars().count();
        let has_hierarchy = CJK_CHAPTER.is_match(text);
        let has_headers = ANY_HEADER.is_match(text);
        let paragraph_count = PARAGRAPH_BREAK.split(text).count();

        if has_hierarchy && length > 2000 {
            Strategy::Hierarchical
        } else if has_headers && paragraph_count > 5 {
            Strategy::Structure
        } else if self.config.semantic_split && length > 1000 {
            Strategy::Semantic
        } else {
            Strategy::Fixed
        }
    }

    fn post_process(
        &self,
        chunks: Vec<TextChunk>,
        document_id: Uuid,
    ) -> Result<Vec<TextChunk>, ProcessingError> {
        let mut final_chunks: Vec<TextChunk> = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let length = chunk.char_len();

            if length > self.config.max_chunk_size {
                let mut children = self.fixed.split(&chunk.content, document_id)?;
                for child in &mut children {
                    child.metadata.parent_chunk_id = Some(chunk.id);
                    child.metadata.extra.insert(
                        "original_split_method".to_string(),
                        serde_json::Value::String(chunk.metadata.split_method.clone()),
                    );
                }
                final_chunks.extend(children);
            } else if length >= self.config.min_chunk_size {
                final_chunks.push(chunk.clone());
            } else if let Some(last) = final_chunks.last_mut() {
                if last.char_len() + length <= self.config.max_chunk_size {
                    last.content.push_str("\n\n");
                    last.content.push_str(&chunk.content);
                    last.metadata.length = last.content.chars().count();
                    last.metadata.merged_chunks =
                        Some(last.metadata.merged_chunks.unwrap_or(0) + 1);
                } else {
                    debug!(
                        chunk_index = chunk.chunk_index,
                        length, "dropping undersized chunk that cannot merge"
                    );
                }
            } else {
                debug!(
                    chunk_index = chunk.chunk_index,
                    length, "dropping undersized leading chunk"
                );
            }
        }

        // A document shorter than min_chunk_size must still yield exactly
        // one chunk carrying all of its content.
        if final_chunks.is_empty() {
            match chunks.into_iter().next() {
                Some(chunk) => final_chunks.push(chunk),
                None => return Err(ProcessingError::NoChunks),
            }
        }

        for (index, chunk) in final_chunks.iter_mut().enumerate() {
            chunk.chunk_index = index;
        }
        Ok(final_chunks)
    }
}

impl Splitter for RecursiveSplitter {
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyText);
        }

        let strategy = self.select_strategy(text);
        info!(
            document_id = %document_id,
            strategy = strategy.as_str(),
            length = text.chars().count(),
            "splitting document"
        );

        let chunks = match strategy {
            Strategy::Fixed => self.fixed.split(text, document_id),
            Strategy::Structure => self.structure.split(text, document_id),
            Strategy::Hierarchical => self.hierarchical.split(text, document_id),
            Strategy::Semantic => self.semantic.split(text, document_id),
        }?;

        if chunks.is_empty() {
            warn!(document_id = %document_id, "splitter produced no chunks");
            return Err(ProcessingError::NoChunks);
        }

        self.post_process(chunks, document_id)
    }
}
