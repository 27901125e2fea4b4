//! Error types for the `docchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
///
/// Every external collaborator maps its failures (transport, auth, rate
/// limits, malformed responses, timeouts) onto exactly one of the first four
/// variants, and decides there whether the failure is transient. Callers that
/// only need a coarse classification can use [`RagError::kind`].
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding service failed or returned an unusable response.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// Writing records to the vector index failed.
    #[error("Index write error ({backend}): {message}")]
    IndexWrite {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// Querying the vector index failed.
    #[error("Index query error ({backend}): {message}")]
    IndexQuery {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// The completion model failed or returned an unusable response.
    #[error("Completion error ({provider}): {message}")]
    Completion {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// A vector record failed validation before being written.
    #[error("Invalid vector record: {0}")]
    InvalidRecord(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// A short, stable label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedding { .. } => "embedding",
            Self::IndexWrite { .. } => "index_write",
            Self::IndexQuery { .. } => "index_query",
            Self::Completion { .. } => "completion",
            Self::InvalidRecord(_) => "invalid_record",
            Self::Config(_) => "config",
        }
    }

    /// Whether a failed call may succeed if repeated.
    ///
    /// Backend failures carry the flag chosen where they were raised;
    /// validation and configuration errors are always permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { retryable, .. }
            | Self::IndexWrite { retryable, .. }
            | Self::IndexQuery { retryable, .. }
            | Self::Completion { retryable, .. } => *retryable,
            Self::InvalidRecord(_) | Self::Config(_) => false,
        }
    }
}

/// Whether an HTTP error status is worth another attempt.
///
/// Rate limits and server errors are transient; any other client error will
/// fail the same way again.
#[cfg(any(feature = "openai", feature = "pinecone"))]
pub(crate) fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
