//! In-memory vector store for tests and examples.
//!
//! Same contract as the Qdrant adapter, including the dimension guard and
//! score clamping, over a `RwLock`-protected map.

use super::error::VectorStoreError;
use super::model::{CollectionInfo, SearchFilter, SearchResult, VectorRecord, clamp_score};
use super::{VectorStore, check_batch_dimensions};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Collection {
    dimension: Option<usize>,
    records: HashMap<Uuid, VectorRecord>,
}

/// Heap-backed [`VectorStore`].
pub struct InMemoryVectorStore {
    name: String,
    collection: RwLock<Collection>,
}

impl InMemoryVectorStore {
    /// An empty store with the given collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(Collection::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.collection.read().records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a chunk id is present.
    pub fn contains(&self, chunk_id: Uuid) -> bool {
        self.collection.read().records.contains_key(&chunk_id)
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn add_vectors(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut collection = self.collection.write();
        // Validate the whole batch before mutating anything.
        let dimension = check_batch_dimensions(&records, collection.dimension)?;

        collection.dimension = dimension;
        for record in records {
            collection.records.insert(record.chunk_id, record);
        }
        Ok(())
    }

    async fn search_similar(
        &self,
        query: &[f32],
        top_k: usize,
        similarity_threshold: f32,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let collection = self.collection.read();
        let mut results: Vec<SearchResult> = collection
            .records
            .values()
            .filter(|record| match &filter {
                Some(f) if !f.is_empty() => f.document_ids.contains(&record.document_id),
                _ => true,
            })
            .filter_map(|record| {
                let score = clamp_score(cosine_similarity(query, &record.embedding));
                (score >= similarity_threshold).then(|| SearchResult {
                    chunk_id: record.chunk_id,
                    document_id: record.document_id,
                    content: record.content.clone(),
                    similarity_score: score,
                    metadata: record.metadata.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), VectorStoreError> {
        let mut collection = self.collection.write();
        collection
            .records
            .retain(|_, record| record.document_id != document_id);
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, VectorStoreError> {
        let collection = self.collection.read();
        Ok(CollectionInfo {
            name: self.name.clone(),
            count: collection.records.len() as u64,
            dimension: collection.dimension,
        })
    }

    async fn cleanup(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}
