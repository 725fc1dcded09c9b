use thiserror::Error;

/// Errors from the model registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registered model matches the name.
    #[error("no {model_type} model named '{name}' is registered")]
    UnknownModel {
        /// Capability that was searched.
        model_type: String,
        /// Requested name.
        name: String,
    },

    /// The named model exists but under a different capability.
    #[error("model '{name}' is a {actual} model, not {expected}")]
    TypeMismatch {
        /// Requested name.
        name: String,
        /// Capability requested.
        expected: String,
        /// Capability registered.
        actual: String,
    },

    /// The registration spec is malformed.
    #[error("invalid model spec: {message}")]
    InvalidSpec {
        /// What was wrong.
        message: String,
    },

    /// Construction or initialization of the underlying instance failed.
    #[error(transparent)]
    Model(#[from] crate::providers::ModelError),

    /// Persisting the corresponding config section failed.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
