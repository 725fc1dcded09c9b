//! Session and history handlers.

use super::error::ApiError;
use super::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use corpora::{QaTurn, Session, SessionStats};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RECENT_SESSION_LIMIT: u32 = 20;

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub history: Vec<QaTurn>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /sessions/`.
pub async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<Session>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let session = state.db.create_session(request.user_id, request.title).await?;
    Ok(Json(session))
}

/// `GET /sessions/recent`.
pub async fn recent(State(state): State<AppState>) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.db.list_recent_sessions(RECENT_SESSION_LIMIT).await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// `GET /sessions/{id}/history`.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.db.get_session_history(id).await?;
    Ok(Json(HistoryResponse {
        session_id: id,
        history,
    }))
}

/// `DELETE /sessions/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.db.delete_session(id).await? {
        return Err(ApiError::NotFound(format!("session not found: {id}")));
    }
    Ok(Json(MessageResponse {
        message: format!("session {id} deleted"),
    }))
}

/// `GET /sessions/stats/summary`.
pub async fn stats(State(state): State<AppState>) -> Result<Json<SessionStats>, ApiError> {
    Ok(Json(state.db.stats_summary().await?))
}
