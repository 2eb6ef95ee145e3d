use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error type.
///
/// Validation, conflict and not-found errors are surfaced to the caller
/// as-is. `IndexLocked` is the one retryable condition: it means another
/// writer currently holds the index and the operation can be attempted
/// again after a short delay.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid title '{0}': must be non-empty and cannot include <>:\"/\\|?*")]
    InvalidTitle(String),

    #[error("'{0}' already exists")]
    AlreadyExists(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("the index is locked by another writer")]
    IndexLocked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("query error: {0}")]
    Query(#[from] tantivy::query::QueryParserError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error is transient writer-lock contention and worth
    /// retrying, as opposed to a hard failure.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, Error::IndexLocked)
    }
}
