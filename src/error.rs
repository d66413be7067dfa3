use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("malformed rating record at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("ratings source contained no ratings")]
    EmptyDataset,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("item catalog error: {0}")]
    Catalog(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecommenderError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller rather than by the data or the host.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
