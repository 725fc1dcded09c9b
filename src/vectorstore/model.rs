//! Record and result types stored in / returned by the vector index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key that carries the originating document's display name.
pub const META_DOCUMENT_NAME: &str = "document_name";
/// Metadata key set by the retrieval engine after reranking.
pub const META_RERANK_SCORE: &str = "rerank_score";

/// One chunk's embedding plus its retrieval payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Primary key (chunk id).
    pub chunk_id: Uuid,
    /// Owning document.
    pub document_id: Uuid,
    /// Chunk content, copied so search results carry their own text.
    pub content: String,
    /// Fixed-dimension embedding.
    pub embedding: Vec<f32>,
    /// Open payload map (`document_name`, `embedding_provider`, ...).
    pub metadata: Map<String, Value>,
}

/// One search hit, scored in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching chunk.
    pub chunk_id: Uuid,
    /// Owning document.
    pub document_id: Uuid,
    /// Chunk content.
    pub content: String,
    /// Cosine similarity (or the mode's replacement score), `[0, 1]`.
    pub similarity_score: f32,
    /// Payload map; reranking adds [`META_RERANK_SCORE`].
    pub metadata: Map<String, Value>,
}

impl SearchResult {
    /// Display name of the source document, when the payload carries one.
    pub fn document_name(&self) -> Option<&str> {
        self.metadata.get(META_DOCUMENT_NAME).and_then(Value::as_str)
    }

    /// Rerank score, when present.
    pub fn rerank_score(&self) -> Option<f32> {
        self.metadata
            .get(META_RERANK_SCORE)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
    }
}

/// Snapshot of a collection's size and dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Stored vector count.
    pub count: u64,
    /// Established embedding dimension; `None` until the first insert.
    pub dimension: Option<usize>,
}

/// Metadata filter for searches.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict hits to these documents. Empty means no restriction.
    pub document_ids: Vec<Uuid>,
}

impl SearchFilter {
    /// Filter for a single document.
    pub fn for_document(document_id: Uuid) -> Self {
        Self {
            document_ids: vec![document_id],
        }
    }

    /// Whether the filter restricts anything.
    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }
}

/// Clamps a cosine score into `[0, 1]`.
///
/// Embeddings are unit-normalized, but antipodal pairs can still produce
/// slightly negative similarities.
pub fn clamp_score(score: f32) -> f32 {
    score.clamp(0.0, 1.0)
}
