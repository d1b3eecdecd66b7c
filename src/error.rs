use thiserror::Error;

/// Main error type for dishdex operations
#[derive(Error, Debug)]
pub enum DishdexError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Query parse error: {0}")]
    QueryParse(String),

    #[error("Write conflict: index at {0} is locked by another writer")]
    WriteConflict(String),

    #[error("Commit failed: {0}")]
    CommitFailure(String),

    #[error("Search timed out after {elapsed_ms}ms")]
    SearchTimeout { elapsed_ms: u64 },

    #[error("Index is closed")]
    Closed,

    #[error("Corrupt commit log at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for dishdex operations
pub type Result<T> = std::result::Result<T, DishdexError>;

impl DishdexError {
    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DishdexError::CommitFailure(_) | DishdexError::SearchTimeout { .. }
        )
    }
}
