use thiserror::Error;

/// Errors raised by the durable-execution substrate.
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// A journal entry exists under this name but could not be decoded
    /// into the type the caller asked for. Indicates the action's result
    /// type changed between runs.
    #[error("Journal entry '{name}' could not be decoded: {source}")]
    JournalDecode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for substrate operations.
pub type Result<T> = std::result::Result<T, SubstrateError>;
