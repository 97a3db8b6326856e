//! Error types for the `notebook-rag` crate.

use thiserror::Error;

/// Errors that can occur across the retrieval pipeline.
///
/// Every variant carries enough context (operation, document, item index)
/// for a caller to report which document, chunk, or question failed.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Fatal; raised before any
    /// pipeline step runs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text extraction failed for a single document. Aborts that
    /// document's ingestion only.
    #[error("Extraction error for '{document}': {message}")]
    Extraction {
        /// The document whose extraction failed.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// Embedding generation failed for a batch of texts after retries
    /// were exhausted. Fatal to the failing batch only; ingestion
    /// reports partial success for the rest.
    #[error("Embedding error at input {index}: {message}")]
    Embedding {
        /// Index of the first failing text within the submitted batch.
        index: usize,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not be reached or rejected the request.
    /// Idempotent writes and deletes may be retried with backoff;
    /// reads are surfaced after a small bounded retry count.
    #[error("Vector store unavailable during {operation}: {message}")]
    StoreUnavailable {
        /// The store operation that failed (`upsert`, `query`, ...).
        operation: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call for answer synthesis failed. Fatal to
    /// that single question; never retried automatically.
    #[error("Synthesis error: {0}")]
    Synthesis(String),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
