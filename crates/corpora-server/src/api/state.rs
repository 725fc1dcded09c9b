//! Shared handler state.

use corpora::{
    ConfigHandle, Database, DatabaseHandle, IngestPipeline, ModelRegistry, QaService,
    RegistryHandle, RetrievalEngine, VectorStoreHandle,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the handlers need, shared by cheap clones.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigHandle,
    pub db: DatabaseHandle,
    pub vectors: VectorStoreHandle,
    pub registry: RegistryHandle,
    pub pipeline: Arc<IngestPipeline>,
    pub retrieval: Arc<RetrievalEngine>,
    pub qa: Arc<QaService>,
    pub uploads_dir: PathBuf,
}

impl AppState {
    /// Wires the core components over an already-connected vector store.
    pub async fn build(
        config: ConfigHandle,
        vectors: VectorStoreHandle,
    ) -> anyhow::Result<Self> {
        let snapshot = config.get();

        let db: DatabaseHandle = Arc::new(Database::connect(&snapshot.database).await?);
        let registry: RegistryHandle = Arc::new(ModelRegistry::from_config(Arc::clone(&config))?);
        registry.initialize().await;

        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::clone(&vectors),
            Arc::clone(&registry),
        ));
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&config),
            Arc::clone(&db),
            Arc::clone(&vectors),
            Arc::clone(&registry),
        ));
        let qa = Arc::new(QaService::new(
            Arc::clone(&config),
            Arc::clone(&db),
            Arc::clone(&retrieval),
            Arc::clone(&registry),
        ));

        let uploads_dir = PathBuf::from(&snapshot.api.uploads_directory);
        std::fs::create_dir_all(&uploads_dir)?;

        Ok(Self {
            config,
            db,
            vectors,
            registry,
            pipeline,
            retrieval,
            qa,
            uploads_dir,
        })
    }

    /// Releases every component, ignoring individual failures.
    pub async fn shutdown(&self) {
        self.registry.cleanup().await;
        if let Err(e) = self.vectors.cleanup().await {
            tracing::warn!(error = %e, "vector store cleanup failed");
        }
        self.db.cleanup().await;
    }
}
