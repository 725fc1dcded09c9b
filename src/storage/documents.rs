//! Document records and their lifecycle queries.

use super::error::StorageError;
use super::Database;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Where a document sits in its pipeline lifecycle.
///
/// pending → processing → ready | error; an explicit reprocess returns a
/// document to processing after clearing derived data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "error" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status '{other}'")),
        }
    }
}

/// One uploaded document's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Original filename, preserved for display.
    pub filename: String,
    pub content_type: String,
    pub byte_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub chunk_count: u32,
    pub vector_count: u32,
}

impl Document {
    /// A fresh `pending` record for an upload.
    pub fn new_pending(filename: impl Into<String>, content_type: impl Into<String>, byte_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content_type: content_type.into(),
            byte_size,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Pending,
            error_message: None,
            chunk_count: 0,
            vector_count: 0,
        }
    }
}

/// Listing plus per-status tallies.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOverview {
    pub documents: Vec<Document>,
    pub total_count: u64,
    pub ready_count: u64,
    pub processing_count: u64,
    pub error_count: u64,
}

fn document_from_row(row: &SqliteRow) -> Result<Document, StorageError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;

    Ok(Document {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::CorruptRow {
            table: "documents",
            message: format!("bad uuid '{id}': {e}"),
        })?,
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        byte_size: row.try_get::<i64, _>("byte_size")? as u64,
        uploaded_at: row.try_get("uploaded_at")?,
        status: status.parse().map_err(|e| StorageError::CorruptRow {
            table: "documents",
            message: e,
        })?,
        error_message: row.try_get("error_message")?,
        chunk_count: row.try_get::<i64, _>("chunk_count")? as u32,
        vector_count: row.try_get::<i64, _>("vector_count")? as u32,
    })
}

impl Database {
    /// Inserts a new document record.
    pub async fn insert_document(&self, document: &Document) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO documents \
             (id, filename, content_type, byte_size, uploaded_at, status, error_message, chunk_count, vector_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id.to_string())
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(document.byte_size as i64)
        .bind(document.uploaded_at)
        .bind(document.status.as_str())
        .bind(&document.error_message)
        .bind(document.chunk_count as i64)
        .bind(document.vector_count as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetches one document.
    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    /// All documents, newest first, with status tallies.
    pub async fn document_overview(&self) -> Result<DocumentOverview, StorageError> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY uploaded_at DESC")
            .fetch_all(self.pool())
            .await?;

        let documents = rows
            .iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let count_of = |status: DocumentStatus| {
            documents.iter().filter(|d| d.status == status).count() as u64
        };

        Ok(DocumentOverview {
            total_count: documents.len() as u64,
            ready_count: count_of(DocumentStatus::Ready),
            processing_count: count_of(DocumentStatus::Processing),
            error_count: count_of(DocumentStatus::Error),
            documents,
        })
    }

    /// Marks a document `processing`, clearing any previous error and
    /// derived counts (the reprocess entry point).
    pub async fn mark_document_processing(&self, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE documents \
             SET status = 'processing', error_message = NULL, chunk_count = 0, vector_count = 0 \
             WHERE id = ?",
        )
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "document",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Marks a document `ready` with its final counts.
    pub async fn mark_document_ready(
        &self,
        id: Uuid,
        chunk_count: u32,
        vector_count: u32,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE documents \
             SET status = 'ready', error_message = NULL, chunk_count = ?, vector_count = ? \
             WHERE id = ?",
        )
        .bind(chunk_count as i64)
        .bind(vector_count as i64)
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "document",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Marks a document `error` with the failure message.
    pub async fn mark_document_error(
        &self,
        id: Uuid,
        message: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE documents \
             SET status = 'error', error_message = ?, chunk_count = 0, vector_count = 0 \
             WHERE id = ?",
        )
        .bind(message)
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "document",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Deletes a document record; returns whether it existed.
    pub async fn delete_document(&self, id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
