//! Vector index adapter.
//!
//! The backing index is Qdrant wrapped behind the [`VectorStore`] trait; an
//! in-memory mock with identical semantics backs the test suite. One
//! invariant is enforced at this layer rather than in the backend: all
//! vectors in a collection share a single embedding dimension, fixed by the
//! first insert.

pub mod error;
pub mod memory;
pub mod model;
pub mod qdrant;

#[cfg(test)]
mod tests;

pub use error::VectorStoreError;
#[cfg(any(test, feature = "mock"))]
pub use memory::InMemoryVectorStore;
pub use model::{
    CollectionInfo, META_DOCUMENT_NAME, META_RERANK_SCORE, SearchFilter, SearchResult,
    VectorRecord, clamp_score,
};
pub use qdrant::QdrantVectorStore;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Uniform contract over the backing vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates or opens the named collection.
    async fn initialize(&self) -> Result<(), VectorStoreError>;

    /// Inserts a batch atomically.
    ///
    /// Every embedding must share one dimension; the first insert fixes the
    /// collection's dimension and later inserts must match it. A rejected
    /// batch leaves no partial state.
    async fn add_vectors(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError>;

    /// Returns up to `top_k` records scoring at or above the threshold,
    /// sorted by score descending. `top_k == 0` short-circuits to an empty
    /// list without touching the index.
    async fn search_similar(
        &self,
        query: &[f32],
        top_k: usize,
        similarity_threshold: f32,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<SearchResult>, VectorStoreError>;

    /// Removes all vectors of one document. Idempotent.
    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), VectorStoreError>;

    /// Collection name, count, and established dimension.
    async fn collection_info(&self) -> Result<CollectionInfo, VectorStoreError>;

    /// Closes the backing index. Idempotent.
    async fn cleanup(&self) -> Result<(), VectorStoreError>;
}

/// Shared vector store handle.
pub type VectorStoreHandle = Arc<dyn VectorStore>;

/// Validates a batch's internal dimension consistency against an optional
/// established dimension; returns the batch's dimension.
pub(crate) fn check_batch_dimensions(
    records: &[VectorRecord],
    established: Option<usize>,
) -> Result<Option<usize>, VectorStoreError> {
    let mut expected = established;
    for record in records {
        if record.embedding.is_empty() {
            return Err(VectorStoreError::EmptyEmbedding {
                chunk_id: record.chunk_id.to_string(),
            });
        }
        match expected {
            None => expected = Some(record.embedding.len()),
            Some(dim) if record.embedding.len() != dim => {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dim,
                    actual: record.embedding.len(),
                    chunk_id: record.chunk_id.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}
