//! Vector store trait: durable, strongly-consistent storage of chunk vectors.

use async_trait::async_trait;

use crate::document::{Chunk, DocumentSummary, ScoredChunk};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// The store is the source of truth for persisted [`Chunk`]s; everything
/// else (the document registry in particular) is derived from it on demand.
/// All operations are strongly consistent: a read immediately after a write
/// observes the write. A substitute backend that cannot honor this must
/// say so via [`strongly_consistent()`](VectorStore::strongly_consistent).
///
/// Failures surface as
/// [`RagError::StoreUnavailable`](crate::RagError::StoreUnavailable) and
/// are never swallowed. Callers retry idempotent writes and deletes with
/// backoff; queries are retried at most a small bounded number of times so
/// latency problems stay visible.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert chunks, idempotent by chunk key: re-upserting a key
    /// overwrites its text, vector, and metadata. Chunks must have
    /// embeddings attached.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return the `top_k` most similar chunks to `embedding`, optionally
    /// restricted to one document.
    ///
    /// Results are sorted by descending cosine similarity, ties broken by
    /// ascending chunk key for determinism, and never exceed `top_k`.
    /// Returned chunks carry metadata and text but not the stored vector.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        document: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Delete chunks by key. Idempotent; unknown keys are not an error.
    async fn delete(&self, keys: &[&str]) -> Result<()>;

    /// Delete every chunk belonging to `document`. Returns the number of
    /// chunks deleted — zero for an unknown document, which is not an error.
    async fn delete_by_document(&self, document: &str) -> Result<usize>;

    /// Delete every chunk in the index. Returns the number deleted.
    async fn delete_all(&self) -> Result<usize>;

    /// Summarize stored chunks grouped by document.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Whether a read immediately after a write is guaranteed to observe
    /// the write. Backends that relax this must override and return `false`.
    fn strongly_consistent(&self) -> bool {
        true
    }
}
