//! Document and pipeline error types.

use thiserror::Error;

/// Errors raised while turning an uploaded file into plain text.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The uploaded file is missing on disk.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Missing path.
        path: String,
    },

    /// No extractor is registered for the extension.
    #[error("unsupported file format '{extension}' (supported: {supported})")]
    UnsupportedFormat {
        /// Offending extension.
        extension: String,
        /// Comma-joined supported extensions.
        supported: String,
    },

    /// None of the candidate encodings decoded the file.
    #[error("could not decode '{path}' with any supported encoding")]
    DecodeFailed {
        /// Offending path.
        path: String,
    },

    /// The file decoded but produced no usable text.
    #[error("document contains no extractable text")]
    EmptyDocument,

    /// Reading the file failed.
    #[error("failed to read '{path}': {message}")]
    Io {
        /// Offending path.
        path: String,
        /// I/O message.
        message: String,
    },

    /// Format-specific extraction failed (corrupt PDF, malformed DOCX).
    #[error("{format} extraction failed: {message}")]
    ExtractionFailed {
        /// Format being extracted.
        format: &'static str,
        /// Backend message.
        message: String,
    },
}

/// Errors raised by splitting, embedding, or indexing a document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Extraction failed upstream.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The text was empty after preprocessing.
    #[error("text is empty after preprocessing")]
    EmptyText,

    /// The splitter produced no chunks.
    #[error("splitter produced no chunks")]
    NoChunks,

    /// A chunk with no content was about to be created.
    #[error("chunk content must not be empty")]
    EmptyChunk,

    /// Embedding the chunks failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] crate::providers::ModelError),

    /// Writing vectors failed.
    #[error("vector indexing failed: {0}")]
    VectorStore(#[from] crate::vectorstore::VectorStoreError),

    /// Updating document records failed.
    #[error("document record update failed: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// The document record disappeared mid-pipeline.
    #[error("document not found: {id}")]
    DocumentNotFound {
        /// Missing document id.
        id: String,
    },
}
