//! Model registry handlers.

use super::error::ApiError;
use super::state::AppState;
use axum::Json;
use axum::extract::State;
use corpora::{ModelSpec, ModelStatusReport, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct AddModelRequest {
    pub model_type: String,
    pub name: String,
    pub provider: String,
    pub model_name: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct AddModelResponse {
    pub success: bool,
    pub loaded: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TestModelRequest {
    pub model_type: String,
    pub model_name: String,
}

#[derive(Serialize)]
pub struct TestModelResponse {
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchModelRequest {
    pub model_type: String,
    pub model_name: String,
}

#[derive(Serialize)]
pub struct SwitchModelResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct ModelConfigsResponse {
    pub model_configs: Vec<ModelSpec>,
    pub active_models: HashMap<String, String>,
    pub model_statuses: HashMap<String, ModelStatusReport>,
}

fn parse_kind(value: &str) -> Result<ProviderKind, ApiError> {
    value
        .parse()
        .map_err(|e: String| ApiError::Validation(e))
}

/// `POST /models/add`.
#[instrument(skip(state, request), fields(name = %request.name))]
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddModelRequest>,
) -> Result<Json<AddModelResponse>, ApiError> {
    let spec = ModelSpec {
        name: request.name.clone(),
        model_type: parse_kind(&request.model_type)?,
        provider: request.provider,
        model_name: request.model_name,
        config: request.config,
        enabled: request.enabled,
        priority: request.priority,
    };

    let loaded = state.registry.add_model(spec).await?;
    Ok(Json(AddModelResponse {
        success: true,
        loaded,
        message: if loaded {
            format!("model '{}' registered and loaded", request.name)
        } else {
            format!("model '{}' registered but failed to load", request.name)
        },
    }))
}

/// `POST /models/test`.
pub async fn test(
    State(state): State<AppState>,
    Json(request): Json<TestModelRequest>,
) -> Result<Json<TestModelResponse>, ApiError> {
    let kind = parse_kind(&request.model_type)?;
    let report = state.registry.test_model(kind, &request.model_name).await;
    Ok(Json(TestModelResponse {
        success: report.success,
        latency_ms: report.latency_ms,
        error: report.error,
    }))
}

/// `GET /models/configs`.
pub async fn configs(
    State(state): State<AppState>,
) -> Result<Json<ModelConfigsResponse>, ApiError> {
    let active_models = state
        .registry
        .active_names()
        .into_iter()
        .map(|(kind, name)| (kind.to_string(), name))
        .collect();

    Ok(Json(ModelConfigsResponse {
        model_configs: state.registry.get_configs(),
        active_models,
        model_statuses: state.registry.get_statuses().await,
    }))
}

/// `POST /models/switch`.
#[instrument(skip(state, request), fields(model = %request.model_name))]
pub async fn switch(
    State(state): State<AppState>,
    Json(request): Json<SwitchModelRequest>,
) -> Result<Json<SwitchModelResponse>, ApiError> {
    let kind = parse_kind(&request.model_type)?;
    state
        .registry
        .switch_active(kind, &request.model_name)
        .await?;
    Ok(Json(SwitchModelResponse {
        success: true,
        message: format!(
            "active {} model switched to '{}'",
            kind, request.model_name
        ),
    }))
}
