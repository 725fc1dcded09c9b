//! Fixed-size splitting with sentence-aware cut points.

use super::super::chunk::{ChunkMetadata, SplitConfig, TextChunk};
use super::super::error::ProcessingError;
use super::{Splitter, clean_text, make_chunk};
use uuid::Uuid;

/// How far past the nominal cut to look for a natural break.
const BREAK_LOOKAHEAD: usize = 50;

const BREAK_CHARS: [char; 4] = ['.', '。', '\n', ' '];

/// Slices text into `chunk_size` windows with `chunk_overlap` carry-over,
/// advancing an in-prose cut to the next break character within a short
/// look-ahead.
pub struct FixedSizeSplitter {
    config: SplitConfig,
}

impl FixedSizeSplitter {
    /// A fixed-size splitter over `config`.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }
}

impl Splitter for FixedSizeSplitter {
    fn split(&self, text: &str, document_id: Uuid) -> Result<Vec<TextChunk>, ProcessingError> {
        if text.trim().is_empty() {
            return Err(ProcessingError::EmptyText);
        }

        let text = clean_text(text);
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        let mut start = 0usize;

        while start < total {
            // The nominal end stays unclamped so the overlap advance below
            // keeps its full stride on the final window.
            let mut end = start + self.config.chunk_size;

            if end < total {
                let lookahead = BREAK_LOOKAHEAD.min(total - end);
                for offset in 0..lookahead {
                    if BREAK_CHARS.contains(&chars[end + offset]) {
                        end = end + offset + 1;
                        break;
                    }
                }
            }

            let slice_end = end.min(total);
            let content: String = chars[start..slice_end].iter().collect();
            if !content.trim().is_empty() {
                let mut metadata =
                    ChunkMetadata::for_strategy("FixedSizeSplitter", "fixed_size", 0);
                metadata.start_pos = Some(start);
                metadata.end_pos = Some(slice_end);

                chunks.push(make_chunk(
                    &self.config,
                    &content,
                    document_id,
                    chunk_index,
                    metadata,
                )?);
                chunk_index += 1;
            }

            // Overlap the next window; always make forward progress.
            start = (end.saturating_sub(self.config.chunk_overlap)).max(start + 1);
        }

        Ok(chunks)
    }
}
