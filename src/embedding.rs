//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates fixed-dimension vector embeddings from text.
///
/// Implementations wrap a remote embedding service behind a unified async
/// interface. `embed_batch` is order-preserving: one vector per input, in
/// input order, each of [`dimensions()`](EmbeddingProvider::dimensions)
/// length — the same dimension for every call over the provider's lifetime.
///
/// Transient failures (rate limits, timeouts) are the implementation's
/// concern: retry with bounded exponential backoff, and after exhaustion
/// fail with [`RagError::Embedding`](crate::RagError::Embedding) carrying
/// the failing input's index. Callers treat that as fatal to the affected
/// batch only, not the whole document.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Backends with native batch endpoints
    /// should override it to bound ingestion latency.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
