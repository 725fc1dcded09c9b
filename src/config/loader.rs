//! YAML configuration loading.
//!
//! The file is chosen by `ENVIRONMENT` (`config/<env>.yaml`), `${VAR}` and
//! `${VAR:default}` placeholders are substituted from the process
//! environment, and a small set of well-known environment variables overlay
//! the parsed sections. Unknown top-level sections are ignored; unknown
//! fields inside a typed section are rejected.

use super::{AppConfig, ConfigError};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}").expect("placeholder regex")
});

/// Section names recognized at the top level of the YAML file.
const KNOWN_SECTIONS: &[&str] = &[
    "app",
    "database",
    "vector_store",
    "embeddings",
    "embedding",
    "llm",
    "retrieval",
    "reranking",
    "api",
];

/// Loads and persists [`AppConfig`] files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolves the config file from `ENVIRONMENT`.
    ///
    /// `config/<env>.yaml` if present, falling back to
    /// `config/development.yaml`, then `config.yaml`.
    pub fn from_environment() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let candidate = PathBuf::from("config").join(format!("{environment}.yaml"));
        if candidate.exists() {
            return Self::new(candidate);
        }

        let dev = PathBuf::from("config/development.yaml");
        if dev.exists() {
            return Self::new(dev);
        }

        Self::new("config.yaml")
    }

    /// The file this loader reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads, substitutes, parses, overlays, and validates the file.
    ///
    /// A missing file is a [`ConfigError::Io`]; use [`Self::load_or_default`]
    /// when absence should mean built-in defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        let substituted = substitute_placeholders(&raw)?;
        let mut config = parse_sections(&substituted, &self.path)?;
        apply_env_overlay(&mut config);
        config.validate()?;

        debug!(path = %self.path.display(), "configuration loaded");
        Ok(config)
    }

    /// Like [`Self::load`], but a missing file yields the default config
    /// (still validated and still overlaid with environment variables).
    pub fn load_or_default(&self) -> Result<AppConfig, ConfigError> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "config file missing, using defaults");
            let mut config = AppConfig::default();
            apply_env_overlay(&mut config);
            config.validate()?;
            return Ok(config);
        }
        self.load()
    }

    /// Serializes the whole config back to the file.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Persist {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        std::fs::write(&self.path, yaml).map_err(|source| ConfigError::Persist {
            path: self.path.clone(),
            source,
        })
    }
}

/// Replaces `${VAR}` / `${VAR:default}` with environment values.
///
/// A bare `${VAR}` with no default and no value is an error; the file asked
/// for something the environment did not supply.
pub(crate) fn substitute_placeholders(content: &str) -> Result<String, ConfigError> {
    let mut missing: Option<String> = None;

    let substituted = PLACEHOLDER.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => match caps.get(2) {
                Some(default) => default.as_str().trim().to_string(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            },
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar { name }),
        None => Ok(substituted.into_owned()),
    }
}

fn parse_sections(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    let root: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut config = AppConfig::default();
    let serde_yaml::Value::Mapping(mapping) = root else {
        // Empty file parses to null; treat as all-defaults.
        return Ok(config);
    };

    for (key, value) in mapping {
        let Some(name) = key.as_str().map(str::to_owned) else {
            continue;
        };
        if !KNOWN_SECTIONS.contains(&name.as_str()) {
            debug!(section = %name, "ignoring unknown config section");
            continue;
        }
        let json = serde_json::to_value(value).map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })?;
        config.set_section(&name, json)?;
    }

    Ok(config)
}

/// Overlays the well-known environment variables onto a parsed config.
///
/// Explicit YAML values lose to the environment for `DATABASE_URL` and the
/// API host/port; API keys only fill in when the section has none.
fn apply_env_overlay(config: &mut AppConfig) {
    if let Ok(url) = env::var("DATABASE_URL") {
        if !url.is_empty() {
            config.database.url = url;
        }
    }

    for (var, provider) in [
        ("SILICONFLOW_API_KEY", "siliconflow"),
        ("OPENAI_API_KEY", "openai"),
    ] {
        let Ok(key) = env::var(var) else { continue };
        if key.is_empty() {
            continue;
        }
        if config.embeddings.provider == provider && config.embeddings.api_key.is_none() {
            config.embeddings.api_key = Some(key.clone());
        }
        if config.llm.provider == provider && config.llm.api_key.is_none() {
            config.llm.api_key = Some(key.clone());
        }
        if config.reranking.provider == provider && config.reranking.api_key.is_none() {
            config.reranking.api_key = Some(key.clone());
        }
    }

    if let Ok(host) = env::var("API_HOST") {
        if !host.is_empty() {
            config.api.host = host;
        }
    }
    if let Ok(port) = env::var("API_PORT") {
        match port.parse() {
            Ok(port) => config.api.port = port,
            Err(_) => warn!(value = %port, "ignoring unparseable API_PORT"),
        }
    }
    if let Ok(url) = env::var("QDRANT_URL") {
        if !url.is_empty() {
            config.vector_store.url = url;
        }
    }
}
