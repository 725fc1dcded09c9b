//! Question answering handler.

use super::error::ApiError;
use super::state::AppState;
use axum::Json;
use axum::extract::State;
use corpora::QaResponse;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// `POST /qa/ask`.
#[instrument(skip(state, request))]
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<QaResponse>, ApiError> {
    let response = state
        .qa
        .answer_question_with(
            &request.question,
            request.session_id,
            request.user_id,
            request.top_k,
        )
        .await?;
    Ok(Json(response))
}
