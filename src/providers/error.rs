//! Model provider error types.

use thiserror::Error;

/// Errors returned by embedding, reranking, and generation providers.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The named provider is not registered or its backend is unavailable.
    #[error("unsupported provider '{provider}': {reason}")]
    UnsupportedProvider {
        /// Provider name as configured.
        provider: String,
        /// Why it cannot be constructed.
        reason: String,
    },

    /// Provider configuration is incomplete or inconsistent.
    #[error("invalid model configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// Operation called before a successful `initialize()`.
    #[error("model '{model}' is not initialized")]
    NotInitialized {
        /// Model name.
        model: String,
    },

    /// `initialize()` failed; the failure is sticky until cleanup.
    #[error("model initialization failed: {message}")]
    InitializationFailed {
        /// Recorded failure message.
        message: String,
    },

    /// Required input was empty.
    #[error("{what} must not be empty")]
    EmptyInput {
        /// Which input.
        what: &'static str,
    },

    /// Input failed validation.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// Upstream returned HTTP 429.
    #[error("rate limited by provider{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Parsed `Retry-After` header, seconds.
        retry_after_secs: Option<u64>,
    },

    /// Upstream rejected the credentials.
    #[error("provider rejected credentials (401/403)")]
    Unauthorized,

    /// Upstream returned a non-success status.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Transport-level failure (connect, TLS, body read).
    #[error("{provider} request failed: {message}")]
    Http {
        /// Provider name.
        provider: &'static str,
        /// Transport error message.
        message: String,
    },

    /// The operation exceeded its deadline.
    #[error("operation timed out after {seconds}s")]
    Timeout {
        /// Deadline that elapsed.
        seconds: u64,
    },

    /// Local model inference failed.
    #[error("inference failed: {message}")]
    Inference {
        /// Backend message.
        message: String,
    },

    /// Upstream response did not match the expected shape.
    #[error("unexpected {provider} response: {message}")]
    ResponseShape {
        /// Provider name.
        provider: &'static str,
        /// What was missing or malformed.
        message: String,
    },
}

impl ModelError {
    /// Whether a retry might succeed (rate limits, 5xx, transport).
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } | ModelError::Http { .. } => true,
            ModelError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
