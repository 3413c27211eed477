//! Error types for batch configuration and execution

use thiserror::Error;

/// Invalid or unloadable configuration. Raised at construction time, never
/// from inside a running batch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parallelism must be at least 1, got {0}")]
    InvalidParallelism(usize),

    #[error("chunk size must be at least 1, got {0}")]
    InvalidChunkSize(usize),

    #[error("retry policy needs at least 1 attempt, got {0}")]
    InvalidRetryAttempts(usize),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Failure of a whole `process()` call
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transform invocation failed or panicked. No partial results are kept.
    #[error("processing failed in chunk {chunk_index}: {source}")]
    Processing {
        chunk_index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The caller cancelled the run while it was waiting for chunks
    #[error("batch processing was interrupted")]
    Interrupted,

    /// A streaming sink rejected a window of results
    #[error("result sink failed on window {window}: {source}")]
    Sink {
        window: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Worker threads could not be started or stopped accepting work
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl BatchError {
    /// Index of the chunk that failed, if the failure came from a transform
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            BatchError::Processing { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BatchError>;
