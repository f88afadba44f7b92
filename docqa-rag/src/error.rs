//! Error types for the `docqa-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval pipeline operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Input was rejected before any I/O took place.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not persist a write.
    #[error("Index write error ({backend}): {message}")]
    IndexWriteError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not be read.
    #[error("Index read error ({backend}): {message}")]
    IndexReadError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A generation call failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// A convenience result type for retrieval pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Failures of a single generation call or of a whole retried call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    /// The prompt was empty or whitespace only.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The backend did not answer within the configured timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend signalled a rate limit (HTTP 429).
    #[error("rate limited by backend")]
    RateLimited {
        /// Delay suggested by the backend, if any.
        retry_after: Option<Duration>,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Every allowed attempt failed with a retryable error.
    #[error("generation failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The error of the final attempt.
        last: Box<GenerationError>,
    },

    /// The caller cancelled the call before it completed.
    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, rate limits, 5xx responses, transport failures and malformed
    /// bodies are transient. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_)
            | GenerationError::RateLimited { .. }
            | GenerationError::Transport(_)
            | GenerationError::MalformedResponse(_) => true,
            GenerationError::Http { status, .. } => *status >= 500,
            GenerationError::EmptyPrompt
            | GenerationError::RetriesExhausted { .. }
            | GenerationError::Cancelled => false,
        }
    }
}
