//! Durable session, history, and document-record store.
//!
//! SQLite through sqlx with hand-written parameterized SQL; the schema is
//! four tables and a handful of queries, so there is no ORM layer. WAL
//! journaling keeps an acknowledged `append_turn` durable across a crash;
//! per-session writes serialize inside their transaction.

pub mod documents;
pub mod error;
pub mod sessions;

#[cfg(test)]
mod tests;

pub use documents::{Document, DocumentOverview, DocumentStatus};
pub use error::StorageError;
pub use sessions::{QaTurn, Session, SessionStats, SourceAttribution};

use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared database handle.
pub type DatabaseHandle = Arc<Database>;

/// Connection pool plus the schema it manages.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the database named by the config.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let Some(path) = config.sqlite_path() else {
            return Err(StorageError::OpenFailed {
                url: config.url.clone(),
                message: "expected a sqlite:///<path> URL".to_string(),
            });
        };

        if path == ":memory:" {
            return Self::in_memory().await;
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::OpenFailed {
                    url: config.url.clone(),
                    message: format!("cannot create database directory: {e}"),
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::OpenFailed {
                url: config.url.clone(),
                message: e.to_string(),
            })?;

        let db = Self { pool };
        db.migrate().await?;
        info!(path, "session store ready");
        Ok(db)
    }

    /// A private in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::OpenFailed {
                url: "sqlite::memory:".to_string(),
                message: e.to_string(),
            })?
            .foreign_keys(true);

        // One connection: each pooled connection would otherwise get its own
        // empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::OpenFailed {
                url: "sqlite::memory:".to_string(),
                message: e.to_string(),
            })?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        const SCHEMA: &str = r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                byte_size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                vector_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                qa_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS qa_turns (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                sources TEXT NOT NULL,
                confidence_score REAL NOT NULL,
                processing_time_ms INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_qa_turns_session
                ON qa_turns(session_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_documents_status
                ON documents(status);
        "#;

        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                message: e.to_string(),
            })?;
        debug!("database schema ensured");
        Ok(())
    }

    /// Closes the pool. Idempotent.
    pub async fn cleanup(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }
}
