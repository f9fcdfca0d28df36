use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Duplicate chunk: {document_id}#{sequence_index} is already indexed")]
    DuplicateChunk { document_id: String, sequence_index: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No results: {0}")]
    NoResults(String),
}

impl Error {
    /// Problems caused by what the caller passed in, as opposed to
    /// infrastructure or deployment problems.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::InvalidArgument(_) | Error::DuplicateChunk { .. }
        )
    }

    /// Only embedding failures are worth retrying; the core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Embedding(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
