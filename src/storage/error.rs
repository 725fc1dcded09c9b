use thiserror::Error;

/// Errors from the session/history database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not open or create the database.
    #[error("failed to open database '{url}': {message}")]
    OpenFailed {
        /// Database URL.
        url: String,
        /// Driver message.
        message: String,
    },

    /// Schema migration failed.
    #[error("schema migration failed: {message}")]
    MigrationFailed {
        /// Driver message.
        message: String,
    },

    /// A query failed.
    #[error("database query failed: {message}")]
    Query {
        /// Driver message.
        message: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (session, document).
        entity: &'static str,
        /// Requested id.
        id: String,
    },

    /// A stored column could not be decoded.
    #[error("corrupt row in {table}: {message}")]
    CorruptRow {
        /// Table name.
        table: &'static str,
        /// What failed to decode.
        message: String,
    },
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Query {
            message: e.to_string(),
        }
    }
}
