//! Document processing pipeline.
//!
//! extract → preprocess → split → embed → index, with document-level
//! transaction semantics: any failure rolls back the vectors already
//! inserted for the document and moves its record to `error`. Extraction,
//! preprocessing, and splitting are CPU-bound and run on the blocking pool.

pub mod chunk;
pub mod error;
pub mod extract;
pub mod preprocess;
pub mod split;

#[cfg(test)]
mod tests;

pub use chunk::{ChunkMetadata, SplitConfig, TextChunk};
pub use error::{DocumentError, ProcessingError};
pub use extract::{SUPPORTED_EXTENSIONS, extract_text};
pub use preprocess::{PreprocessConfig, TextPreprocessor};
pub use split::{RecursiveSplitter, Splitter};

use crate::config::ConfigHandle;
use crate::registry::RegistryHandle;
use crate::storage::{Database, DatabaseHandle, Document};
use crate::vectorstore::{META_DOCUMENT_NAME, VectorRecord, VectorStoreHandle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Drives documents from upload to indexed vectors.
pub struct IngestPipeline {
    config: ConfigHandle,
    db: DatabaseHandle,
    vectors: VectorStoreHandle,
    registry: RegistryHandle,
}

impl IngestPipeline {
    /// Wires the pipeline to its collaborators.
    pub fn new(
        config: ConfigHandle,
        db: DatabaseHandle,
        vectors: VectorStoreHandle,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            config,
            db,
            vectors,
            registry,
        }
    }

    /// The session/document store this pipeline writes to.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Creates the `pending` record for an upload. An empty upload is
    /// rejected before any record exists.
    pub async fn register_upload(
        &self,
        filename: &str,
        content_type: &str,
        byte_size: u64,
    ) -> Result<Document, ProcessingError> {
        if byte_size == 0 {
            return Err(DocumentError::EmptyDocument.into());
        }

        let document = Document::new_pending(filename, content_type, byte_size);
        self.db.insert_document(&document).await?;
        info!(document_id = %document.id, filename, "document registered");
        Ok(document)
    }

    /// Runs the full pipeline for one registered document.
    ///
    /// On success the record transitions to `ready` with its chunk and
    /// vector counts; on failure every vector already inserted for the
    /// document is removed and the record transitions to `error`.
    #[instrument(skip(self, path), fields(document_id = %document_id))]
    pub async fn process_document(
        &self,
        document_id: Uuid,
        path: &Path,
    ) -> Result<Document, ProcessingError> {
        let document = self
            .db
            .get_document(document_id)
            .await?
            .ok_or_else(|| ProcessingError::DocumentNotFound {
                id: document_id.to_string(),
            })?;

        self.db.mark_document_processing(document_id).await?;

        match self.run(&document, path).await {
            Ok(chunk_count) => {
                self.db
                    .mark_document_ready(document_id, chunk_count as u32, chunk_count as u32)
                    .await?;
                info!(chunk_count, "document ready");
                self.db
                    .get_document(document_id)
                    .await?
                    .ok_or_else(|| ProcessingError::DocumentNotFound {
                        id: document_id.to_string(),
                    })
            }
            Err(e) => {
                error!(error = %e, "document pipeline failed, rolling back");
                if let Err(rollback) = self.vectors.delete_by_document(document_id).await {
                    warn!(error = %rollback, "vector rollback failed");
                }
                if let Err(mark) = self.db.mark_document_error(document_id, &e.to_string()).await
                {
                    warn!(error = %mark, "failed to record document error");
                }
                Err(e)
            }
        }
    }

    /// Clears a document's derived data and runs the pipeline again.
    pub async fn reprocess_document(
        &self,
        document_id: Uuid,
        path: &Path,
    ) -> Result<Document, ProcessingError> {
        self.vectors.delete_by_document(document_id).await?;
        self.process_document(document_id, path).await
    }

    /// Removes a document's vectors and record. Returns whether the record
    /// existed.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<bool, ProcessingError> {
        self.vectors.delete_by_document(document_id).await?;
        Ok(self.db.delete_document(document_id).await?)
    }

    async fn run(&self, document: &Document, path: &Path) -> Result<usize, ProcessingError> {
        let snapshot = self.config.get();
        let split_config = SplitConfig::from(&snapshot.embeddings);
        let document_id = document.id;
        let path: PathBuf = path.to_owned();

        let chunks = tokio::task::spawn_blocking(move || {
            let raw = extract::extract_text(&path)?;
            let cleaned = TextPreprocessor::new(PreprocessConfig::default()).process(&raw);
            if cleaned.is_empty() {
                return Err(ProcessingError::EmptyText);
            }
            RecursiveSplitter::new(split_config).split(&cleaned, document_id)
        })
        .await
        .map_err(|e| ProcessingError::Document(DocumentError::ExtractionFailed {
            format: "pipeline",
            message: format!("processing task panicked: {e}"),
        }))??;

        let embedder = self.registry.active_embedder();
        embedder.initialize().await?;
        let batch_size = embedder.batch_size().max(1);

        self.vectors.initialize().await?;

        let mut stored = 0usize;
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| {
                    let dimensions = embedding.len();
                    let mut metadata = chunk.metadata.to_value_map();
                    metadata.insert(
                        META_DOCUMENT_NAME.to_string(),
                        Value::String(document.filename.clone()),
                    );
                    metadata.insert(
                        "chunk_index".to_string(),
                        Value::from(chunk.chunk_index),
                    );
                    metadata.insert(
                        "embedding_provider".to_string(),
                        Value::String(embedder.provider_name().to_string()),
                    );
                    metadata.insert(
                        "embedding_model".to_string(),
                        Value::String(embedder.model_name().to_string()),
                    );
                    metadata.insert("embedding_dimensions".to_string(), Value::from(dimensions));

                    VectorRecord {
                        chunk_id: chunk.id,
                        document_id,
                        content: chunk.content.clone(),
                        embedding,
                        metadata,
                    }
                })
                .collect();

            self.vectors.add_vectors(records).await?;
            stored += batch.len();
        }

        Ok(stored)
    }
}
