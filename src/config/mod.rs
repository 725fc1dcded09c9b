//! Application configuration.
//!
//! Configuration is loaded from a YAML file selected by the `ENVIRONMENT`
//! variable (`config/<env>.yaml`), with `${VAR}` / `${VAR:default}`
//! placeholder substitution and environment-variable overlays for the
//! well-known settings (`DATABASE_URL`, `*_API_KEY`, ...). See [`loader`].
//!
//! [`ConfigManager`] holds the live snapshot: readers get a cheap
//! copy-on-write [`Arc<AppConfig>`], writers validate, persist, and publish.

pub mod error;
pub mod loader;
pub mod manager;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use manager::{ConfigManager, ValidationReport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Providers accepted for embeddings, reranking, and generation.
pub const SUPPORTED_PROVIDERS: &[&str] =
    &["mock", "local", "siliconflow", "openai", "sentence_transformers", "huggingface"];

/// Top-level application configuration, one field per YAML section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// `app` section.
    #[serde(default)]
    pub app: AppSection,
    /// `database` section.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// `vector_store` section.
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    /// `embeddings` section (`embedding` accepted as an alias at load time).
    #[serde(default, alias = "embedding")]
    pub embeddings: EmbeddingsConfig,
    /// `llm` section.
    #[serde(default)]
    pub llm: LlmConfig,
    /// `retrieval` section.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// `reranking` section.
    #[serde(default)]
    pub reranking: RerankingConfig,
    /// `api` section.
    #[serde(default)]
    pub api: ApiConfig,
}

impl AppConfig {
    /// Runs every section validator and aggregates the failures into a
    /// single [`ConfigError::Validation`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.database.validate());
        errors.extend(self.vector_store.validate());
        errors.extend(self.embeddings.validate());
        errors.extend(self.llm.validate());
        errors.extend(self.retrieval.validate());
        errors.extend(self.reranking.validate());
        errors.extend(self.api.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { errors })
        }
    }

    /// Serializes one section to a JSON value, by section name.
    pub fn section_value(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        let value = match name {
            "app" => serde_json::to_value(&self.app),
            "database" => serde_json::to_value(&self.database),
            "vector_store" => serde_json::to_value(&self.vector_store),
            "embeddings" | "embedding" => serde_json::to_value(&self.embeddings),
            "llm" => serde_json::to_value(&self.llm),
            "retrieval" => serde_json::to_value(&self.retrieval),
            "reranking" => serde_json::to_value(&self.reranking),
            "api" => serde_json::to_value(&self.api),
            other => {
                return Err(ConfigError::UnknownSection {
                    name: other.to_string(),
                })
            }
        };

        value.map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })
    }

    /// Replaces one section from a JSON value, by section name.
    ///
    /// Unknown fields inside the section are rejected
    /// (`deny_unknown_fields` on every section struct).
    pub fn set_section(&mut self, name: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        fn parse<T: serde::de::DeserializeOwned>(
            section: &str,
            value: serde_json::Value,
        ) -> Result<T, ConfigError> {
            serde_json::from_value(value).map_err(|e| ConfigError::InvalidSection {
                section: section.to_string(),
                message: e.to_string(),
            })
        }

        match name {
            "app" => self.app = parse(name, value)?,
            "database" => self.database = parse(name, value)?,
            "vector_store" => self.vector_store = parse(name, value)?,
            "embeddings" | "embedding" => self.embeddings = parse("embeddings", value)?,
            "llm" => self.llm = parse(name, value)?,
            "retrieval" => self.retrieval = parse(name, value)?,
            "reranking" => self.reranking = parse(name, value)?,
            "api" => self.api = parse(name, value)?,
            other => {
                return Err(ConfigError::UnknownSection {
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// `app` section: display name and debug flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppSection {
    pub name: String,
    pub version: String,
    pub debug: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "corpora".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            debug: false,
        }
    }
}

/// `database` section: the session/history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// SQLite URL in `sqlite:///<path>` form (`sqlite:///:memory:` for tests).
    pub url: String,
    /// Log every SQL statement at debug level.
    pub echo: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///./data/corpora.db".to_string(),
            echo: false,
        }
    }
}

impl DatabaseConfig {
    /// Path portion of a `sqlite:///` URL, if this is one.
    pub fn sqlite_path(&self) -> Option<&str> {
        self.url.strip_prefix("sqlite:///")
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.url.is_empty() {
            errors.push("database.url must not be empty".to_string());
        } else if !self.url.starts_with("sqlite:") {
            errors.push(format!(
                "database.url must be a sqlite URL, got '{}'",
                self.url
            ));
        }
        errors
    }
}

/// `vector_store` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint.
    pub url: String,
    /// Collection that holds the chunk vectors.
    pub collection_name: String,
    /// Directory for collection-local state (established dimension record).
    pub persist_directory: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection_name: "knowledge_base".to_string(),
            persist_directory: "./data/vectors".to_string(),
        }
    }
}

impl VectorStoreConfig {
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.collection_name.trim().is_empty() {
            errors.push("vector_store.collection_name must not be empty".to_string());
        }
        let persist = Path::new(&self.persist_directory);
        if persist.exists() && !persist.is_dir() {
            errors.push(format!(
                "vector_store.persist_directory is not a directory: {}",
                self.persist_directory
            ));
        }
        errors
    }
}

/// `embeddings` section: the active embedding model plus chunking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    /// Expected output dimension; `None` lets the provider report it.
    pub dimensions: Option<usize>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Texts per embedding request.
    pub batch_size: usize,
    /// Input truncation length in characters.
    pub max_length: usize,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub max_concurrent_requests: usize,
    /// Minimum spacing between requests, milliseconds. Zero disables spacing.
    pub request_interval_ms: u64,
    pub enable_fallback: bool,
    pub fallback_provider: String,
    // Chunking parameters consumed by the document pipeline.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub semantic_split: bool,
    pub generate_summary: bool,
    pub generate_questions: bool,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock-embedding".to_string(),
            dimensions: None,
            api_key: None,
            base_url: None,
            batch_size: 32,
            max_length: 8000,
            timeout_secs: 60,
            retry_attempts: 3,
            max_concurrent_requests: 10,
            request_interval_ms: 0,
            enable_fallback: false,
            fallback_provider: "mock".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 2000,
            semantic_split: false,
            generate_summary: false,
            generate_questions: false,
        }
    }
}

impl EmbeddingsConfig {
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_provider("embeddings", &self.provider, &mut errors);
        if self.model.trim().is_empty() {
            errors.push("embeddings.model must not be empty".to_string());
        }
        if self.batch_size == 0 {
            errors.push("embeddings.batch_size must be positive".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("embeddings.timeout_secs must be positive".to_string());
        }
        if self.max_concurrent_requests == 0 {
            errors.push("embeddings.max_concurrent_requests must be positive".to_string());
        }
        if let Some(dims) = self.dimensions {
            if dims == 0 {
                errors.push("embeddings.dimensions must be positive".to_string());
            }
        }
        if self.chunk_size == 0 {
            errors.push("embeddings.chunk_size must be positive".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            errors.push(format!(
                "embeddings.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        if self.min_chunk_size > self.max_chunk_size {
            errors.push(format!(
                "embeddings.min_chunk_size ({}) must not exceed max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            ));
        }
        errors
    }
}

/// `llm` section: the active generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Total generation deadline, seconds.
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    /// Assembled context is truncated to this many characters.
    pub max_context_length: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock-llm".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            api_key: None,
            base_url: None,
            timeout_secs: 60,
            retry_attempts: 3,
            max_context_length: 8000,
        }
    }
}

impl LlmConfig {
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_provider("llm", &self.provider, &mut errors);
        if self.model.trim().is_empty() && self.provider != "mock" {
            errors.push("llm.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            errors.push("llm.max_tokens must be positive".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("llm.timeout_secs must be positive".to_string());
        }
        if self.max_context_length == 0 {
            errors.push("llm.max_context_length must be positive".to_string());
        }
        errors
    }
}

/// How the retrieval engine combines scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Embedding cosine similarity only.
    #[default]
    Semantic,
    /// Lexical token-overlap scoring over the semantic candidate pool.
    Keyword,
    /// Convex blend of semantic and lexical scores.
    Hybrid,
}

impl SearchMode {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode '{other}' (expected semantic, keyword, or hybrid)"
            )),
        }
    }
}

/// `retrieval` section, passed verbatim into every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum similarity kept from the primary search, `[0, 1]`.
    pub similarity_threshold: f32,
    pub search_mode: SearchMode,
    pub enable_rerank: bool,
    pub enable_cache: bool,
    /// Semantic weight of the hybrid blend; lexical weight is `1 - alpha`.
    pub hybrid_alpha: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.3,
            search_mode: SearchMode::Semantic,
            enable_rerank: false,
            enable_cache: false,
            hybrid_alpha: 0.7,
        }
    }
}

impl RetrievalConfig {
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.top_k == 0 {
            errors.push("retrieval.top_k must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            errors.push(format!(
                "retrieval.similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            errors.push(format!(
                "retrieval.hybrid_alpha must be within [0, 1], got {}",
                self.hybrid_alpha
            ));
        }
        errors
    }
}

/// `reranking` section: the active cross-encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RerankingConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Input truncation length in characters.
    pub max_length: usize,
    /// Query/document pairs per request.
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub max_concurrent_requests: usize,
    pub request_interval_ms: u64,
    pub enable_fallback: bool,
    pub fallback_provider: String,
    /// Local model directory (config.json + model.safetensors + tokenizer.json).
    pub model_cache_dir: Option<String>,
}

impl Default for RerankingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock-reranker".to_string(),
            api_key: None,
            base_url: None,
            max_length: 512,
            batch_size: 32,
            timeout_secs: 30,
            retry_attempts: 3,
            max_concurrent_requests: 10,
            request_interval_ms: 0,
            enable_fallback: true,
            fallback_provider: "mock".to_string(),
            model_cache_dir: None,
        }
    }
}

impl RerankingConfig {
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_provider("reranking", &self.provider, &mut errors);
        if self.model.trim().is_empty() {
            errors.push("reranking.model must not be empty".to_string());
        }
        if self.max_length == 0 {
            errors.push("reranking.max_length must be positive".to_string());
        }
        if self.batch_size == 0 {
            errors.push("reranking.batch_size must be positive".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("reranking.timeout_secs must be positive".to_string());
        }
        errors
    }
}

/// `api` section, consumed by the HTTP shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Directory where uploaded originals are kept.
    pub uploads_directory: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            uploads_directory: "./data/uploads".to_string(),
        }
    }
}

impl ApiConfig {
    /// `host:port` for the listener.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("api.host must not be empty".to_string());
        }
        if self.port == 0 {
            errors.push("api.port must be positive".to_string());
        }
        errors
    }
}

fn validate_provider(section: &str, provider: &str, errors: &mut Vec<String>) {
    // Empty means auto-detection from api_key/base_url at factory time.
    if provider.is_empty() {
        return;
    }
    if !SUPPORTED_PROVIDERS.contains(&provider) {
        errors.push(format!(
            "{section}.provider '{provider}' is not supported (expected one of: {})",
            SUPPORTED_PROVIDERS.join(", ")
        ));
    }
}

/// Shared read handle over the live configuration snapshot.
pub type ConfigHandle = Arc<ConfigManager>;
