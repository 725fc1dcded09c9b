//! Document upload and lifecycle handlers.

use super::error::ApiError;
use super::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use corpora::{Document, DocumentOverview};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Serialize)]
pub struct UploadResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /documents/upload` — accepts one multipart `file` field and runs
/// the pipeline to completion before responding.
#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .unwrap_or("upload.txt")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))?;
        upload = Some((filename, content_type, bytes.to_vec()));
        break;
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(ApiError::Validation(
            "multipart body must contain a 'file' field".to_string(),
        ));
    };

    let document = state
        .pipeline
        .register_upload(&filename, &content_type, bytes.len() as u64)
        .await?;

    // Keep the original alongside the derived data so reprocessing can
    // re-read it later.
    let stored_path = state
        .uploads_dir
        .join(format!("{}_{}", document.id, sanitize_filename(&filename)));
    tokio::fs::write(&stored_path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

    let processed = state
        .pipeline
        .process_document(document.id, &stored_path)
        .await;

    let status = match processed {
        Ok(document) => document.status.to_string(),
        Err(e) => {
            // The record already carries the error; report the terminal
            // status rather than failing the upload call.
            info!(error = %e, "upload processing failed");
            "error".to_string()
        }
    };

    Ok(Json(UploadResponse {
        document_id: document.id,
        filename,
        status,
    }))
}

/// `GET /documents/`.
pub async fn list(State(state): State<AppState>) -> Result<Json<DocumentOverview>, ApiError> {
    Ok(Json(state.db.document_overview().await?))
}

/// `GET /documents/{id}`.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .db
        .get_document(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("document not found: {id}")))?;
    Ok(Json(document))
}

/// `POST /documents/{id}/reprocess` — clears derived data and runs the
/// pipeline again from the stored original.
#[instrument(skip(state))]
pub async fn reprocess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.db.get_document(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("document not found: {id}")));
    }

    let stored_path = find_stored_original(&state, id).await.ok_or_else(|| {
        ApiError::NotFound(format!("stored original for document {id} is missing"))
    })?;

    let document = state.pipeline.reprocess_document(id, &stored_path).await?;
    Ok(Json(MessageResponse {
        message: format!("document {} reprocessed: {}", id, document.status),
    }))
}

/// `DELETE /documents/{id}` — removes the record, its vectors, and the
/// stored original.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let existed = state.pipeline.delete_document(id).await?;
    if !existed {
        return Err(ApiError::NotFound(format!("document not found: {id}")));
    }

    if let Some(stored) = find_stored_original(&state, id).await {
        if let Err(e) = tokio::fs::remove_file(&stored).await {
            tracing::warn!(error = %e, "failed to remove stored original");
        }
    }

    Ok(Json(MessageResponse {
        message: format!("document {id} deleted"),
    }))
}

/// Locates the stored original by its `<id>_` prefix.
async fn find_stored_original(state: &AppState, id: Uuid) -> Option<std::path::PathBuf> {
    let prefix = format!("{id}_");
    let mut entries = tokio::fs::read_dir(&state.uploads_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix))
        {
            return Some(entry.path());
        }
    }
    None
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}
