use thiserror::Error;

/// Errors returned by vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Could not connect to the backing index.
    #[error("failed to connect to vector store at '{url}': {message}")]
    ConnectionFailed {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Collection creation or lookup failed.
    #[error("collection '{collection}' operation failed: {message}")]
    CollectionFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound {
        /// Collection name.
        collection: String,
    },

    /// A record's embedding does not match the collection's dimension.
    #[error("embedding dimension mismatch: collection uses {expected}, record '{chunk_id}' has {actual}")]
    DimensionMismatch {
        /// Established collection dimension.
        expected: usize,
        /// Offending record's dimension.
        actual: usize,
        /// Offending record.
        chunk_id: String,
    },

    /// A record carried an empty embedding.
    #[error("record '{chunk_id}' has an empty embedding")]
    EmptyEmbedding {
        /// Offending record.
        chunk_id: String,
    },

    /// Insert failed.
    #[error("failed to insert vectors into '{collection}': {message}")]
    InsertFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Search failed.
    #[error("failed to search '{collection}': {message}")]
    SearchFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Delete failed.
    #[error("failed to delete vectors from '{collection}': {message}")]
    DeleteFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Local persistence (dimension record, collection directory) failed.
    #[error("vector store persistence failed at '{path}': {message}")]
    PersistenceFailed {
        /// Affected path.
        path: String,
        /// Error message.
        message: String,
    },
}
