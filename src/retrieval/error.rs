use thiserror::Error;

/// Errors surfaced by the retrieval engine.
///
/// Reranker failures never appear here; they degrade to the un-reranked
/// ordering and are only counted and logged.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query was empty.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Query embedding failed.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] crate::providers::ModelError),

    /// The primary vector search failed.
    #[error("vector search failed: {0}")]
    Search(#[from] crate::vectorstore::VectorStoreError),
}
