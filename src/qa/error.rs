use thiserror::Error;

/// Errors surfaced by the QA orchestrator.
///
/// Generation failures and timeouts never appear here; they produce the
/// degraded answer path instead.
#[derive(Debug, Error)]
pub enum QaError {
    /// The question was empty.
    #[error("question must not be empty")]
    EmptyQuestion,

    /// Retrieval failed; no partial answer is produced.
    #[error(transparent)]
    Retrieval(#[from] crate::retrieval::RetrievalError),

    /// Session or history persistence failed.
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}
