//! # Corpora Core
//!
//! Document-to-answer RAG core: ingest heterogeneous documents, build a
//! searchable vector index, and serve context-grounded answers with source
//! attribution.
//!
//! ```text
//! ingest:  file → extract → preprocess → split → embed → index
//! query:   question → retrieve (semantic/keyword/hybrid, rerank) → generate → answer + sources
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use corpora::config::ConfigLoader;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = ConfigLoader::from_environment().load_or_default()?;
//! println!("serving on {}", config.api.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `cpu` | CPU-only inference (docs.rs default) |
//! | `metal` | Apple Silicon GPU acceleration |
//! | `cuda` | NVIDIA GPU acceleration |
//! | `mock` | In-memory backends for tests/examples |
//!
//! ## Modules
//!
//! - [`config`] - YAML configuration with hot reload
//! - [`providers`] - embedding / reranking / generation providers
//! - [`registry`] - multi-model registry and active-model switching
//! - [`vectorstore`] - Qdrant-backed vector index adapter
//! - [`storage`] - sessions, history, and document records (SQLite)
//! - [`ingest`] - extraction, preprocessing, splitting, indexing
//! - [`retrieval`] - multi-mode search with optional reranking
//! - [`qa`] - question answering over retrieved context

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod ingest;
pub mod providers;
pub mod qa;
pub mod registry;
pub mod retrieval;
pub mod storage;
pub mod text;
pub mod vectorstore;

pub use config::{
    AppConfig, ConfigError, ConfigHandle, ConfigLoader, ConfigManager, RetrievalConfig,
    SearchMode, ValidationReport,
};
pub use ingest::{
    ChunkMetadata, DocumentError, IngestPipeline, ProcessingError, SplitConfig, TextChunk,
};
pub use providers::{
    Embedder, EmbedderHandle, GenerationOutput, GenerationRequest, Generator, GeneratorHandle,
    HealthReport, HealthStatus, MetricsSnapshot, MockEmbedder, MockGenerator, MockReranker,
    ModelError, ModelState, ProviderFactory, ProviderKind, Reranker, RerankerHandle,
};
pub use qa::{QaError, QaResponse, QaService};
pub use registry::{
    ModelRegistry, ModelSpec, ModelStatusReport, RegistryError, RegistryHandle, TestReport,
};
pub use retrieval::{RetrievalEngine, RetrievalError, RetrievalStatsSnapshot};
pub use storage::{
    Database, DatabaseHandle, Document, DocumentOverview, DocumentStatus, QaTurn, Session,
    SessionStats, SourceAttribution, StorageError,
};
#[cfg(any(test, feature = "mock"))]
pub use vectorstore::InMemoryVectorStore;
pub use vectorstore::{
    CollectionInfo, QdrantVectorStore, SearchFilter, SearchResult, VectorRecord, VectorStore,
    VectorStoreError, VectorStoreHandle,
};
