//! Configuration handlers.

use super::error::ApiError;
use super::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use corpora::ValidationReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

#[derive(Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub section: String,
    pub config: Value,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
}

/// `GET /config/`.
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.config.get();
    let value = serde_json::to_value(&*snapshot)
        .map_err(|e| ApiError::Internal(format!("config serialization failed: {e}")))?;
    Ok(Json(value))
}

/// `GET /config/{section}`.
pub async fn get_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.config.section(&section)?))
}

/// `PUT /config/{section}` — validates, merges, persists, and publishes.
#[instrument(skip(state, partial))]
pub async fn update_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(partial): Json<Value>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let snapshot = state.config.update_section(&section, partial)?;
    let config = snapshot.section_value(&section)?;
    Ok(Json(UpdateResponse {
        success: true,
        message: format!("section '{section}' updated"),
        config,
    }))
}

/// `POST /config/validate` — dry-run, no state change.
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    Ok(Json(
        state.config.validate_update(&request.section, request.config),
    ))
}

/// `POST /config/reload`.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    state.config.reload()?;
    Ok(Json(ReloadResponse {
        success: true,
        message: "configuration reloaded from disk".to_string(),
    }))
}
