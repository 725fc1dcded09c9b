//! Live configuration management.
//!
//! Readers take a copy-on-write snapshot; [`ConfigManager::update_section`]
//! validates, persists the whole file, swaps the snapshot, and notifies
//! subscribers through a watch channel.

use super::{AppConfig, ConfigError, ConfigLoader};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Result of a dry-run validation of a partial section update.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationReport {
    /// Whether the merged config passed validation.
    pub valid: bool,
    /// Validation failures, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal observations about the proposed values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Owns the live [`AppConfig`] snapshot and its persistence.
pub struct ConfigManager {
    loader: ConfigLoader,
    current: ArcSwap<AppConfig>,
    notifier: watch::Sender<Arc<AppConfig>>,
    // Serializes the read-merge-persist-publish write path.
    write_lock: Mutex<()>,
}

impl ConfigManager {
    /// Wraps an already-loaded config.
    pub fn new(loader: ConfigLoader, config: AppConfig) -> Self {
        let snapshot = Arc::new(config);
        let (notifier, _) = watch::channel(Arc::clone(&snapshot));
        Self {
            loader,
            current: ArcSwap::from(snapshot),
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads from the loader's path (missing file means defaults).
    pub fn from_loader(loader: ConfigLoader) -> Result<Self, ConfigError> {
        let config = loader.load_or_default()?;
        Ok(Self::new(loader, config))
    }

    /// Current snapshot. Cheap; safe to call per request.
    pub fn get(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// One section of the current snapshot as JSON.
    pub fn section(&self, name: &str) -> Result<Value, ConfigError> {
        self.get().section_value(name)
    }

    /// Receiver that yields every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppConfig>> {
        self.notifier.subscribe()
    }

    /// Validates a partial section update without applying it.
    pub fn validate_update(&self, section: &str, partial: Value) -> ValidationReport {
        match self.merged_with(section, partial) {
            Ok(candidate) => match candidate.validate() {
                Ok(()) => ValidationReport {
                    valid: true,
                    errors: Vec::new(),
                    warnings: advisory_warnings(&candidate),
                },
                Err(ConfigError::Validation { errors }) => ValidationReport {
                    valid: false,
                    errors,
                    warnings: Vec::new(),
                },
                Err(other) => ValidationReport {
                    valid: false,
                    errors: vec![other.to_string()],
                    warnings: Vec::new(),
                },
            },
            Err(e) => ValidationReport {
                valid: false,
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            },
        }
    }

    /// Validates, merges, persists the whole file, and publishes.
    ///
    /// On any failure the live snapshot is untouched.
    pub fn update_section(
        &self,
        section: &str,
        partial: Value,
    ) -> Result<Arc<AppConfig>, ConfigError> {
        let _guard = self.write_lock.lock();

        let candidate = self.merged_with(section, partial)?;
        candidate.validate()?;
        self.loader.save(&candidate)?;

        let snapshot = self.publish(candidate);
        info!(section, "configuration section updated");
        Ok(snapshot)
    }

    /// Re-reads the file from disk and publishes the result.
    pub fn reload(&self) -> Result<Arc<AppConfig>, ConfigError> {
        let _guard = self.write_lock.lock();
        let config = self.loader.load_or_default()?;
        let snapshot = self.publish(config);
        info!(path = %self.loader.path().display(), "configuration reloaded");
        Ok(snapshot)
    }

    /// Persists the current snapshot as-is (used when a model registration
    /// rewrites a section programmatically).
    pub fn persist_current(&self) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock();
        self.loader.save(&self.get())
    }

    /// Replaces a whole section programmatically (already-typed callers).
    pub fn replace_section(
        &self,
        section: &str,
        value: Value,
    ) -> Result<Arc<AppConfig>, ConfigError> {
        let _guard = self.write_lock.lock();
        let mut candidate = (*self.get()).clone();
        candidate.set_section(section, value)?;
        candidate.validate()?;
        self.loader.save(&candidate)?;
        Ok(self.publish(candidate))
    }

    fn merged_with(&self, section: &str, partial: Value) -> Result<AppConfig, ConfigError> {
        let mut candidate = (*self.get()).clone();
        let mut current = candidate.section_value(section)?;

        match (&mut current, partial) {
            (Value::Object(base), Value::Object(overlay)) => {
                for (key, value) in overlay {
                    base.insert(key, value);
                }
            }
            (_, other) => {
                return Err(ConfigError::InvalidSection {
                    section: section.to_string(),
                    message: format!("expected a JSON object, got {other}"),
                })
            }
        }

        candidate.set_section(section, current)?;
        Ok(candidate)
    }

    fn publish(&self, config: AppConfig) -> Arc<AppConfig> {
        let snapshot = Arc::new(config);
        self.current.store(Arc::clone(&snapshot));
        // send_replace delivers to any subscribers without failing when
        // nobody is listening yet.
        self.notifier.send_replace(Arc::clone(&snapshot));
        snapshot
    }
}

fn advisory_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.retrieval.top_k > 50 {
        warnings.push(format!(
            "retrieval.top_k = {} is unusually large and may slow answers",
            config.retrieval.top_k
        ));
    }
    if config.retrieval.enable_rerank && config.reranking.provider == "mock" {
        warnings.push("reranking is enabled but the provider is 'mock'".to_string());
    }
    if config.retrieval.enable_cache && config.retrieval.enable_rerank {
        warnings
            .push("cached results are reused without re-invoking the reranker".to_string());
    }
    warnings
}
