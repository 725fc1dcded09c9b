//! Qdrant-backed [`VectorStore`].

use super::error::VectorStoreError;
use super::model::{CollectionInfo, SearchFilter, SearchResult, VectorRecord, clamp_score};
use super::{VectorStore, check_batch_dimensions};
use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Qdrant client wrapper scoped to one collection.
pub struct QdrantVectorStore {
    client: Qdrant,
    url: String,
    collection: String,
    persist_directory: PathBuf,
    established_dimension: RwLock<Option<usize>>,
}

impl QdrantVectorStore {
    /// Connects to `url`, scoped to `collection`.
    pub fn connect(
        url: &str,
        collection: impl Into<String>,
        persist_directory: impl Into<PathBuf>,
    ) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.into(),
            persist_directory: persist_directory.into(),
            established_dimension: RwLock::new(None),
        })
    }

    /// The configured endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(
                            dimension as u64,
                            Distance::Cosine,
                        ))
                        .on_disk_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::CollectionFailed {
                    collection: self.collection.clone(),
                    message: e.to_string(),
                })?;
            info!(
                collection = %self.collection,
                dimension,
                "created vector collection"
            );
        }

        Ok(())
    }

    async fn backend_dimension(&self) -> Result<Option<usize>, VectorStoreError> {
        use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;

        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(info
            .result
            .as_ref()
            .and_then(|r| r.config.as_ref())
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|config| match config {
                VectorsConfig::Params(params) => Some(params.size as usize),
                VectorsConfig::ParamsMap(_) => None,
            }))
    }

    fn to_point(&self, record: &VectorRecord) -> Result<PointStruct, VectorStoreError> {
        let payload = Payload::try_from(json!({
            "document_id": record.document_id.to_string(),
            "content": record.content,
            "metadata": Value::Object(record.metadata.clone()),
        }))
        .map_err(|e| VectorStoreError::InsertFailed {
            collection: self.collection.clone(),
            message: format!("payload conversion failed for '{}': {e}", record.chunk_id),
        })?;

        Ok(PointStruct::new(
            record.chunk_id.to_string(),
            record.embedding.clone(),
            payload,
        ))
    }

    fn from_scored_point(point: ScoredPoint) -> Option<SearchResult> {
        let chunk_id = match point.id.as_ref()?.point_id_options.as_ref()? {
            PointIdOptions::Uuid(s) => Uuid::parse_str(s).ok()?,
            PointIdOptions::Num(_) => return None,
        };

        let mut payload: Map<String, Value> = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, v.into_json()))
            .collect();

        let document_id = payload
            .get("document_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())?;
        let content = payload
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata = match payload.remove("metadata") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Some(SearchResult {
            chunk_id,
            document_id,
            content,
            similarity_score: clamp_score(point.score),
            metadata,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn initialize(&self) -> Result<(), VectorStoreError> {
        let collection_dir = self.persist_directory.join(&self.collection);
        std::fs::create_dir_all(&collection_dir).map_err(|e| {
            VectorStoreError::PersistenceFailed {
                path: collection_dir.display().to_string(),
                message: e.to_string(),
            }
        })?;

        // Re-opening an existing collection re-establishes its dimension.
        if let Some(dimension) = self.backend_dimension().await? {
            *self.established_dimension.write() = Some(dimension);
            debug!(
                collection = %self.collection,
                dimension,
                "opened existing vector collection"
            );
        }

        Ok(())
    }

    async fn add_vectors(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let established = *self.established_dimension.read();
        let dimension = check_batch_dimensions(&records, established)?
            .expect("non-empty batch yields a dimension");

        if established.is_none() {
            self.ensure_collection(dimension).await?;
            *self.established_dimension.write() = Some(dimension);
        }

        let points = records
            .iter()
            .map(|record| self.to_point(record))
            .collect::<Result<Vec<_>, _>>()?;

        let upsert = UpsertPointsBuilder::new(&self.collection, points.clone()).wait(true);
        let result = self.client.upsert_points(upsert).await;
        let result = match result {
            // Upserts are keyed by point id, so one retry cannot duplicate.
            Err(first) => {
                warn!(error = %first, "vector insert failed, retrying once");
                tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                self.client
                    .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                    .await
            }
            ok => ok,
        };

        result.map_err(|e| VectorStoreError::InsertFailed {
            collection: self.collection.clone(),
            message: e.to_string(),
        })?;
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

        let build = || {
            let mut builder =
                SearchPointsBuilder::new(&self.collection, query.to_vec(), top_k as u64)
                    .with_payload(true)
                    .score_threshold(similarity_threshold);
            if let Some(f) = &filter {
                if !f.is_empty() {
                    let conditions: Vec<Condition> = f
                        .document_ids
                        .iter()
                        .map(|id| Condition::matches("document_id", id.to_string()))
                        .collect();
                    builder = builder.filter(Filter::should(conditions));
                }
            }
            builder
        };

        let result = match self.client.search_points(build()).await {
            Err(first) => {
                warn!(error = %first, "vector search failed, retrying once");
                tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                self.client.search_points(build()).await
            }
            ok => ok,
        };

        let response = result.map_err(|e| VectorStoreError::SearchFailed {
            collection: self.collection.clone(),
            message: e.to_string(),
        })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(Self::from_scored_point)
            .collect())
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::DeleteFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;
        if !exists {
            // Nothing indexed yet; deleting is a no-op.
            return Ok(());
        }

        let filter = Filter::must([Condition::matches(
            "document_id",
            document_id.to_string(),
        )]);
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::DeleteFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        if !exists {
            return Ok(CollectionInfo {
                name: self.collection.clone(),
                count: 0,
                dimension: *self.established_dimension.read(),
            });
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        let count = info
            .result
            .as_ref()
            .and_then(|r| r.points_count)
            .unwrap_or(0);

        let established = *self.established_dimension.read();
        let dimension = match established {
            Some(d) => Some(d),
            None => self.backend_dimension().await?,
        };

        Ok(CollectionInfo {
            name: self.collection.clone(),
            count,
            dimension,
        })
    }

    async fn cleanup(&self) -> Result<(), VectorStoreError> {
        // The gRPC channel closes on drop; nothing to flush.
        Ok(())
    }
}
