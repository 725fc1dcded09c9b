//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use corpora::{
    ConfigError, DocumentError, ModelError, ProcessingError, QaError, RegistryError,
    RetrievalError, StorageError,
};
use thiserror::Error;

/// Errors leaving the HTTP layer. Every variant maps to a status class:
/// 400 for validation, 404 for missing resources, 429 preserved from
/// upstream rate limits, 500 otherwise.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rate limited by upstream provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("{0}")]
    Internal(String),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut headers = HeaderMap::new();
        if let ApiError::RateLimited {
            retry_after_secs: Some(secs),
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert(header::RETRY_AFTER, value);
            }
        }

        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, headers, body).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::UnknownSection { .. } => ApiError::NotFound(e.to_string()),
            ConfigError::Validation { .. } | ConfigError::InvalidSection { .. } => {
                ApiError::Validation(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs }
            }
            ModelError::UnsupportedProvider { .. }
            | ModelError::InvalidConfig { .. }
            | ModelError::EmptyInput { .. }
            | ModelError::InvalidInput { .. } => ApiError::Validation(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::Document(
                DocumentError::UnsupportedFormat { .. }
                | DocumentError::EmptyDocument
                | DocumentError::DecodeFailed { .. },
            ) => ApiError::Validation(e.to_string()),
            ProcessingError::DocumentNotFound { .. } => ApiError::NotFound(e.to_string()),
            ProcessingError::Embedding(inner) => ApiError::from(inner),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownModel { .. } => ApiError::NotFound(e.to_string()),
            RegistryError::InvalidSpec { .. } | RegistryError::TypeMismatch { .. } => {
                ApiError::Validation(e.to_string())
            }
            RegistryError::Model(inner) => ApiError::from(inner),
            RegistryError::Config(inner) => ApiError::from(inner),
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::EmptyQuery => ApiError::Validation(e.to_string()),
            RetrievalError::Embedding(inner) => ApiError::from(inner),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QaError> for ApiError {
    fn from(e: QaError) -> Self {
        match e {
            QaError::EmptyQuestion => ApiError::Validation(e.to_string()),
            QaError::Retrieval(inner) => ApiError::from(inner),
            QaError::Storage(inner) => ApiError::from(inner),
        }
    }
}
