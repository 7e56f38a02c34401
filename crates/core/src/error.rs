//! Error types for the document QA pipeline.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Embedding provider errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("gave up after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Index build and persistence errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index has not been built yet")]
    NotBuilt,

    #[error("build failed: {0}")]
    Build(String),

    #[error("persisted index is unusable: {0}")]
    Corrupt(String),

    #[error("failed to persist index: {0}")]
    Persist(String),

    #[error("representation {name} failed: {message}")]
    Representation { name: String, message: String },

    #[error("search failed: {0}")]
    Search(String),
}

/// Corpus loading and chunking errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("corpus directory not found: {0}")]
    CorpusNotFound(String),

    #[error("corpus is empty: {0}")]
    EmptyCorpus(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
}

/// Generative model errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Cache backend errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO failed: {0}")]
    Io(String),

    #[error("cached value is unusable: {0}")]
    Corrupt(String),
}

/// Pipeline orchestration errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline has not been built yet")]
    NotInitialized,

    #[error("stage {stage} failed: {message}")]
    Stage { stage: String, message: String },
}

impl Error {
    /// Create a generic error from a message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// Transient provider failures and timeouts are retryable; data,
    /// configuration, and usage errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Embedding(e) => matches!(
                e,
                EmbeddingError::Timeout(_)
                    | EmbeddingError::Provider(_)
                    | EmbeddingError::Exhausted { .. }
            ),
            Error::Llm(e) => matches!(e, LlmError::Timeout(_) | LlmError::Provider(_)),
            // only built when the per-representation embed budget elapses
            Error::Index(e) => matches!(e, IndexError::Representation { .. }),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
