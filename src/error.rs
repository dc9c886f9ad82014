//! Error types shared by the scheduler, the store and the review session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// Input rejected before any computation (bad quality, malformed fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller handed in a base state that is already invalid.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Compare-and-swap failed because the record changed underneath us.
    #[error("Review record {record_id} was modified concurrently")]
    StaleRecord { record_id: i64 },

    #[error("Review record not found: {0}")]
    RecordNotFound(i64),

    #[error("Deck not found: {0}")]
    DeckNotFound(String),

    #[error("Flashcard not found: {0}")]
    CardNotFound(i64),

    #[error("Cannot {action} while session is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReviewError {
    /// True for failures where retrying the same submission may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReviewError::Persistence(_) | ReviewError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
