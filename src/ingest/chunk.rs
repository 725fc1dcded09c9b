//! Text chunks and their metadata.

use crate::config::EmbeddingsConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Typed chunk metadata: the fields every strategy sets, the
/// strategy-specific fields, and an open extension map for everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Content length in characters.
    pub length: usize,
    /// When the chunk was produced.
    pub created_at: Option<DateTime<Utc>>,
    /// Splitter type name (`FixedSizeSplitter`, ...).
    pub splitter_type: String,
    /// Strategy key (`fixed_size`, `structure`, `hierarchical`, `semantic`).
    pub split_method: String,

    // Fixed-size strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_pos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_pos: Option<usize>,

    // Structure strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraphs: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_level: Option<u8>,

    // Hierarchical strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy_path: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,

    // Semantic strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_group: Option<usize>,

    // Post-processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_chunk_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_chunks: Option<u32>,

    // Derived content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,

    /// Anything else, serialized transparently alongside the typed fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    /// Base metadata for a strategy.
    pub fn for_strategy(splitter_type: &str, split_method: &str, length: usize) -> Self {
        Self {
            length,
            created_at: Some(Utc::now()),
            splitter_type: splitter_type.to_string(),
            split_method: split_method.to_string(),
            ..Self::default()
        }
    }

    /// Serializes to the open map stored in the vector index payload.
    pub fn to_value_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// A contiguous fragment of one document, the unit of embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Dense 0-based position within the document.
    pub chunk_index: usize,
    /// Non-empty, trimmed content.
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl TextChunk {
    /// Content length in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Splitting parameters, taken from the `embeddings` config section.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub semantic_split: bool,
    pub generate_summary: bool,
    pub generate_questions: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 2000,
            semantic_split: false,
            generate_summary: false,
            generate_questions: false,
        }
    }
}

impl From<&EmbeddingsConfig> for SplitConfig {
    fn from(config: &EmbeddingsConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            semantic_split: config.semantic_split,
            generate_summary: config.generate_summary,
            generate_questions: config.generate_questions,
        }
    }
}
