//! Paragraph/header-driven splitting.

use super::super::chunk::{ChunkMetadata, SplitConfig, TextChunk};
use super::super::error::ProcessingError;
use super::{
    CJK_CHAPTER, MD_HEADER, NUMBERED_TITLE, PARAGRAPH_BREAK, Splitter, clean_text, make_chunk,
};
use uuid::Uuid;

/// Splits on paragraph boundaries: a header starts a new chunk, and the
/// running chunk flushes when adding a paragraph would exceed `chunk_size`,
/// carrying `chunk_overlap` characters into the next chunk.
pub struct StructureSplitter {
    config: SplitConfig,
}

struct Accumulator {
    content: String,
    paragraphs: Vec<usize>,
    has_header: bool,
    header_level: Option<u8>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            content: String::new(),
            paragraphs: Vec::new(),
            has_header: false,
            header_level: None,
        }
    }

    fn metadata(&self) -> ChunkMetadata {
        let mut metadata = ChunkMetadata::for_strategy("StructureSplitter", "structure", 0);
        metadata.paragraphs = Some(self.paragraphs.clone());
        if self.has_header {
            metadata.has_header = Some(true);
            metadata.header_level = self.header_level;
        }
        metadata
    }
}

impl StructureSplitter {
    /// A structure splitter over `config`.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    fn is_header(paragraph: &str) -> bool {
        let paragraph = paragraph.trim();
        if MD_HEADER.is_match(paragraph) {
            return true;
        }
        if paragraph.chars().count() < 100 && NUMBERED_TITLE.is_match(paragraph) {
            return true;
        }
        CJK_CHAPTER.is_match(paragraph)
    }

    fn header_level(paragraph: &str) -> u8 {
        MD_HEADER
            .captures(paragraph.trim())
            .map(|caps| caps[1].len() as u8)
            .unwrap_or(1)
    }

    fn overlap_tail(&self, content: &str) -> String {
        let chars: Vec<char> = content.chars().collect();
        let from = chars.len().saturating_sub(self.config.chunk_overlap);
        chars[from..].iter().collect()
    }
}

impl Splitter for StructureSplitter {
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyText);
        }

        let text = clean_text(text);
        let paragraphs: Vec<&str> = PARAGRAPH_BREAK
            .split(&text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        let mut current = Accumulator::new();

        for (para_idx, paragraph) in paragraphs.iter().enumerate() {
            let is_header = Self::is_header(paragraph);

            // A header closes the running chunk.
            if is_header && !current.content.trim().is_empty() {
                chunks.push(make_chunk(
                    &self.config,
                    &current.content,
                    document_id,
                    chunk_index,
                    current.metadata(),
                )?);
                chunk_index += 1;
                current = Accumulator::new();
            }

            let para_len = paragraph.chars().count();
            let current_len = current.content.chars().count();

            if !current.content.is_empty() && current_len + para_len > self.config.chunk_size {
                chunks.push(make_chunk(
                    &self.config,
                    &current.content,
                    document_id,
                    chunk_index,
                    current.metadata(),
                )?);
                chunk_index += 1;

                let carried = if self.config.chunk_overlap > 0 {
                    format!("{}\n\n{paragraph}", self.overlap_tail(&current.content))
                } else {
                    (*paragraph).to_string()
                };
                current = Accumulator::new();
                current.content = carried;
                current.paragraphs.push(para_idx);
            } else if current.content.is_empty() {
                current.content = (*paragraph).to_string();
                current.paragraphs.push(para_idx);
            } else {
                current.content.push_str("\n\n");
                current.content.push_str(paragraph);
                current.paragraphs.push(para_idx);
            }

            if is_header {
                current.has_header = true;
                current.header_level = Some(Self::header_level(paragraph));
            }
        }

        if !current.content.trim().is_empty() {
            chunks.push(make_chunk(
                &self.config,
                &current.content,
                document_id,
                chunk_index,
                current.metadata(),
            )?);
        }

        Ok(chunks)
    }
}
