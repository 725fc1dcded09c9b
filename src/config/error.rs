//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading, validating, or updating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be written back.
    #[error("failed to persist config file '{path}': {source}")]
    Persist {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax error.
    #[error("invalid YAML in '{path}': {message}")]
    Yaml {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A `${VAR}` placeholder referenced an unset variable with no default.
    #[error("environment variable '{name}' is not set and has no default")]
    MissingEnvVar {
        /// Placeholder variable name.
        name: String,
    },

    /// Section name not part of the configuration schema.
    #[error("unknown config section: {name}")]
    UnknownSection {
        /// Requested section name.
        name: String,
    },

    /// A section body failed to deserialize (unknown field, wrong type).
    #[error("invalid '{section}' section: {message}")]
    InvalidSection {
        /// Section being parsed.
        section: String,
        /// Deserializer message.
        message: String,
    },

    /// A value failed to serialize (internal).
    #[error("serialization failed: {message}")]
    Serialize {
        /// Serializer message.
        message: String,
    },

    /// Aggregated validation failures across all sections.
    #[error("configuration validation failed:\n{}", errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Validation {
        /// One message per failed rule.
        errors: Vec<String>,
    },
}
