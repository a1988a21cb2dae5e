use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot compute a benchmark over zero eligible values of '{metric}'")]
    EmptyInput { metric: String },

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Percentile fraction {p} outside [0, 1]")]
    InvalidPercentile { p: String },

    #[error("Snapshot '{id}' not found")]
    SnapshotNotFound { id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
