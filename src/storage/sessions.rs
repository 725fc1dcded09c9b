//! Sessions, QA turns, and their queries.

use super::error::StorageError;
use super::Database;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

/// One conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every appended turn.
    pub updated_at: DateTime<Utc>,
    /// Recomputed on every appended turn.
    pub qa_count: u32,
}

/// One retrieved source attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub similarity_score: f32,
    /// First 200 characters of the chunk content.
    pub content_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// One question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaTurn {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    /// Clamped to `[0, 1]`.
    pub confidence_score: f32,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate usage numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub total_qa_pairs: u64,
    pub avg_qa_per_session: f64,
    pub active_sessions_last_24h: u64,
}

fn session_from_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let id: String = row.try_get("id")?;
    Ok(Session {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::CorruptRow {
            table: "sessions",
            message: format!("bad uuid '{id}': {e}"),
        })?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        qa_count: row.try_get::<i64, _>("qa_count")? as u32,
    })
}

fn turn_from_row(row: &SqliteRow) -> Result<QaTurn, StorageError> {
    let id: String = row.try_get("id")?;
    let session_id: String = row.try_get("session_id")?;
    let sources_json: String = row.try_get("sources")?;

    Ok(QaTurn {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::CorruptRow {
            table: "qa_turns",
            message: format!("bad uuid '{id}': {e}"),
        })?,
        session_id: Uuid::parse_str(&session_id).map_err(|e| StorageError::CorruptRow {
            table: "qa_turns",
            message: format!("bad session uuid '{session_id}': {e}"),
        })?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        sources: serde_json::from_str(&sources_json).map_err(|e| StorageError::CorruptRow {
            table: "qa_turns",
            message: format!("bad sources JSON: {e}"),
        })?,
        confidence_score: row.try_get::<f64, _>("confidence_score")? as f32,
        processing_time_ms: row.try_get::<i64, _>("processing_time_ms")? as u64,
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Creates and returns a new session.
    pub async fn create_session(
        &self,
        user_id: Option<String>,
        title: Option<String>,
    ) -> Result<Session, StorageError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            title,
            created_at: now,
            updated_at: now,
            qa_count: 0,
        };

        sqlx::query(
            "INSERT INTO sessions (id, user_id, title, created_at, updated_at, qa_count) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(self.pool())
        .await?;

        Ok(session)
    }

    /// Fetches one session.
    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    /// Most recently active sessions.
    pub async fn list_recent_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(session_from_row).collect()
    }

    /// Appends a turn and bumps the owning session, atomically.
    pub async fn append_turn(&self, turn: &QaTurn) -> Result<(), StorageError> {
        let sources = serde_json::to_string(&turn.sources).map_err(|e| StorageError::Query {
            message: format!("failed to serialize sources: {e}"),
        })?;

        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE sessions SET qa_count = qa_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(turn.created_at)
        .bind(turn.session_id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "session",
                id: turn.session_id.to_string(),
            });
        }

        sqlx::query(
            "INSERT INTO qa_turns \
             (id, session_id, question, answer, sources, confidence_score, processing_time_ms, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(turn.id.to_string())
        .bind(turn.session_id.to_string())
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(sources)
        .bind(turn.confidence_score as f64)
        .bind(turn.processing_time_ms as i64)
        .bind(turn.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// A session's turns in chronological order.
    pub async fn get_session_history(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<QaTurn>, StorageError> {
        if self.get_session(session_id).await?.is_none() {
            return Err(StorageError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            });
        }

        let rows = sqlx::query(
            "SELECT * FROM qa_turns WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(turn_from_row).collect()
    }

    /// Deletes a session and (by cascade) its turns.
    pub async fn delete_session(&self, id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Aggregate statistics over all sessions.
    pub async fn stats_summary(&self) -> Result<SessionStats, StorageError> {
        let total_sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(self.pool())
            .await?;
        let total_qa_pairs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qa_turns")
            .fetch_one(self.pool())
            .await?;

        let cutoff = Utc::now() - Duration::hours(24);
        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE updated_at >= ?")
                .bind(cutoff)
                .fetch_one(self.pool())
                .await?;

        Ok(SessionStats {
            total_sessions: total_sessions as u64,
            total_qa_pairs: total_qa_pairs as u64,
            avg_qa_per_session: if total_sessions == 0 {
                0.0
            } else {
                total_qa_pairs as f64 / total_sessions as f64
            },
            active_sessions_last_24h: active as u64,
        })
    }
}
