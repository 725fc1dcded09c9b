//! QA orchestration.
//!
//! [`QaService::answer_question`] is the query-side entry point: resolve
//! (or create) the session, retrieve context, build the prompt, call the
//! active generator under the configured deadline, score confidence,
//! persist the turn, and return the response with its sources.
//!
//! Generation failure or timeout is non-fatal: the deterministic degraded
//! answer ships with zero confidence and the retrieved sources attached.

pub mod confidence;
pub mod error;
pub mod prompt;

#[cfg(test)]
mod tests;

pub use confidence::confidence_score;
pub use error::QaError;
pub use prompt::{SYSTEM_PROMPT, assemble_context, build_user_prompt};

use crate::config::ConfigHandle;
use crate::providers::GenerationRequest;
use crate::registry::RegistryHandle;
use crate::retrieval::RetrievalEngine;
use crate::storage::{DatabaseHandle, QaTurn, SourceAttribution};
use crate::vectorstore::SearchResult;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Deterministic reply when generation fails or times out.
pub const DEGRADED_ANSWER: &str =
    "I cannot answer this question due to a temporary issue. Please try again later.";

/// Reply when retrieval finds nothing above the threshold.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find relevant information in the knowledge base to answer this question.";

/// Characters of chunk content kept in a source preview.
const PREVIEW_CHARS: usize = 200;

/// The answer payload returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    pub confidence_score: f32,
    pub session_id: Uuid,
    pub processing_time_ms: u64,
}

/// Orchestrates retrieval, generation, and history persistence.
pub struct QaService {
    config: ConfigHandle,
    db: DatabaseHandle,
    retrieval: Arc<RetrievalEngine>,
    registry: RegistryHandle,
}

impl QaService {
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        config: ConfigHandle,
        db: DatabaseHandle,
        retrieval: Arc<RetrievalEngine>,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            config,
            db,
            retrieval,
            registry,
        }
    }

    /// Answers one question, creating a session when none is given.
    pub async fn answer_question(
        &self,
        question: &str,
        session_id: Option<Uuid>,
        user_id: Option<String>,
    ) -> Result<QaResponse, QaError> {
        self.answer_question_with(question, session_id, user_id, None)
            .await
    }

    /// Like [`Self::answer_question`], with a per-request `top_k` override.
    #[instrument(skip(self, question), fields(session_id))]
    pub async fn answer_question_with(
        &self,
        question: &str,
        session_id: Option<Uuid>,
        user_id: Option<String>,
        top_k: Option<usize>,
    ) -> Result<QaResponse, QaError> {
        if question.trim().is_empty() {
            return Err(QaError::EmptyQuestion);
        }
        let start = Instant::now();
        let snapshot = self.config.get();

        let session_id = match session_id {
            Some(id) => id,
            None => {
                let session = self.db.create_session(user_id, None).await?;
                tracing::Span::current()
                    .record("session_id", tracing::field::display(session.id));
                session.id
            }
        };

        let mut retrieval_config = snapshot.retrieval.clone();
        if let Some(top_k) = top_k {
            retrieval_config.top_k = top_k;
        }
        let results = self
            .retrieval
            .search_with_config(question, &retrieval_config)
            .await?;
        let sources = to_attributions(&results);

        let (answer, confidence) = if results.is_empty() {
            (NO_CONTEXT_ANSWER.to_string(), 0.0)
        } else {
            let context = assemble_context(&results, snapshot.llm.max_context_length);
            let request = GenerationRequest {
                system: Some(SYSTEM_PROMPT.to_string()),
                prompt: build_user_prompt(question, &context),
                temperature: snapshot.llm.temperature,
                max_tokens: snapshot.llm.max_tokens,
            };

            match self.generate_with_deadline(request, snapshot.llm.timeout_secs).await {
                Ok(text) => {
                    let confidence = confidence_score(&sources, &text);
                    (text, confidence)
                }
                Err(message) => {
                    warn!(error = %message, "generation degraded");
                    (DEGRADED_ANSWER.to_string(), 0.0)
                }
            }
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        let turn = QaTurn {
            id: Uuid::new_v4(),
            session_id,
            question: question.to_string(),
            answer: answer.clone(),
            sources: sources.clone(),
            confidence_score: confidence,
            processing_time_ms,
            created_at: Utc::now(),
        };
        self.db.append_turn(&turn).await?;

        info!(
            confidence,
            sources = sources.len(),
            processing_time_ms,
            "question answered"
        );

        Ok(QaResponse {
            question: question.to_string(),
            answer,
            sources,
            confidence_score: confidence,
            session_id,
            processing_time_ms,
        })
    }

    /// Runs generation under the configured total deadline. Any failure is
    /// reported as a message for the degraded path, never an error.
    async fn generate_with_deadline(
        &self,
        request: GenerationRequest,
        timeout_secs: u64,
    ) -> Result<String, String> {
        let generator = self.registry.active_generator();
        generator.initialize().await.map_err(|e| e.to_string())?;

        let deadline = Duration::from_secs(timeout_secs);
        match tokio::time::timeout(deadline, generator.generate(request)).await {
            Ok(Ok(output)) => Ok(output.text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("generation timed out after {timeout_secs}s")),
        }
    }
}

/// Converts search hits into persisted source attributions with
/// 200-character previews.
fn to_attributions(results: &[SearchResult]) -> Vec<SourceAttribution> {
    results
        .iter()
        .map(|result| SourceAttribution {
            chunk_id: result.chunk_id,
            document_id: result.document_id,
            document_name: result.document_name().unwrap_or("unknown").to_string(),
            similarity_score: result.similarity_score,
            content_preview: result.content.chars().take(PREVIEW_CHARS).collect(),
            rerank_score: result.rerank_score(),
        })
        .collect()
}
