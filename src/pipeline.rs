//! Pipeline orchestrator: ingest (chunk → embed → upsert) and ask
//! (retrieve → synthesize).
//!
//! # Concurrency
//!
//! The pipeline holds no mutable state; providers and the store are
//! `Send + Sync` behind `Arc`s, so one pipeline serves many concurrent
//! sessions. Chunk keys are namespaced by document filename and ordinal,
//! so no cross-document locking is needed. Concurrent ingestion of the
//! *same* document is not safe without external serialization — callers
//! must serialize "process document" requests per filename. Questions
//! never block writers; visibility is the store's read-after-write
//! guarantee.

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{AskResult, Chunk, IngestReport, Page};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::model::ChatModel;
use crate::registry::DocumentRegistry;
use crate::retrieval::RetrievalPolicy;
use crate::retry::Backoff;
use crate::store::VectorStore;
use crate::synthesis::AnswerSynthesizer;

/// The retrieval pipeline orchestrator.
///
/// Construct via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    policy: RetrievalPolicy,
    synthesizer: AnswerSynthesizer,
    registry: DocumentRegistry,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The vector store backend.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The derived document registry.
    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    /// Ingest one document: chunk, embed in batches, upsert.
    ///
    /// A batch that fails to embed after retries is dropped and reported;
    /// the remaining chunks are still indexed, so the report may show
    /// partial success (`chunks_indexed` of `chunks_indexed +
    /// chunks_failed`). Zero extracted pages is a success with zero
    /// chunks and no remote call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] when the final upsert keeps
    /// failing after bounded retries.
    pub async fn ingest(&self, document: &str, pages: &[Page]) -> Result<IngestReport> {
        let chunks = self.chunker.split(document, pages);
        if chunks.is_empty() {
            info!(document, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport {
                document: document.to_string(),
                chunks_indexed: 0,
                chunks_failed: 0,
                failed_ordinals: Vec::new(),
            });
        }

        let mut ready: Vec<Chunk> = Vec::with_capacity(chunks.len());
        let mut failed_ordinals: Vec<usize> = Vec::new();
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            match self.embedder.embed_batch(&texts).await {
                Ok(embeddings) if embeddings.len() == batch.len() => {
                    for (chunk, embedding) in batch.iter().zip(embeddings) {
                        let mut chunk = chunk.clone();
                        chunk.embedding = embedding;
                        ready.push(chunk);
                    }
                }
                Ok(embeddings) => {
                    error!(
                        document,
                        expected = batch.len(),
                        got = embeddings.len(),
                        "embedding batch returned wrong count, dropping batch"
                    );
                    failed_ordinals.extend(batch.iter().map(|c| c.ordinal));
                }
                Err(e) => {
                    error!(
                        document,
                        batch_start = batch[0].ordinal,
                        error = %e,
                        "embedding batch failed, continuing with the rest"
                    );
                    failed_ordinals.extend(batch.iter().map(|c| c.ordinal));
                }
            }
        }

        if !ready.is_empty() {
            let mut backoff = Backoff::new(self.config.max_retries);
            loop {
                match self.store.upsert(&ready).await {
                    Ok(()) => break,
                    Err(e) => {
                        if !backoff.wait("upsert").await {
                            error!(document, error = %e, "upsert failed after retries");
                            return Err(e);
                        }
                    }
                }
            }
        }

        let report = IngestReport {
            document: document.to_string(),
            chunks_indexed: ready.len(),
            chunks_failed: failed_ordinals.len(),
            failed_ordinals,
        };
        info!(
            document,
            chunks_indexed = report.chunks_indexed,
            chunks_failed = report.chunks_failed,
            "ingested document"
        );
        Ok(report)
    }

    /// Re-ingest a document: delete every existing chunk for it, then
    /// ingest the new pages. This is the only supported update path —
    /// chunks are immutable once embedded.
    pub async fn reingest(&self, document: &str, pages: &[Page]) -> Result<IngestReport> {
        let deleted = self.delete_document(document).await?;
        info!(document, deleted, "cleared previous chunks before re-ingest");
        self.ingest(document, pages).await
    }

    /// Answer a question from the indexed documents.
    ///
    /// Retrieval applies the configured top-k and similarity floor; the
    /// synthesizer makes at most one model call and short-circuits to a
    /// fixed answer when nothing survived the floor.
    pub async fn ask(&self, question: &str) -> Result<AskResult> {
        let retrieval = self.policy.retrieve(question).await?;
        let answer = self.synthesizer.answer(question, &retrieval.candidates).await?;
        Ok(AskResult { answer, retrieval: retrieval.stats })
    }

    /// Delete every chunk of `document`, with bounded retries. Returns
    /// the number of chunks deleted (zero for an unknown document).
    pub async fn delete_document(&self, document: &str) -> Result<usize> {
        let mut backoff = Backoff::new(self.config.max_retries);
        loop {
            match self.store.delete_by_document(document).await {
                Ok(deleted) => return Ok(deleted),
                Err(e) => {
                    if !backoff.wait("delete_by_document").await {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Delete every chunk in the index, with bounded retries.
    pub async fn delete_all(&self) -> Result<usize> {
        let mut backoff = Backoff::new(self.config.max_retries);
        loop {
            match self.store.delete_all().await {
                Ok(deleted) => return Ok(deleted),
                Err(e) => {
                    if !backoff.wait("delete_all").await {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// Config, embedder, store, and model are required; the chunker defaults
/// to a [`RecursiveChunker`] built from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    model: Option<Arc<dyn ChatModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the language model used for answer synthesis.
    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Build the [`RagPipeline`], validating that all required parts are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required part is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let model = self.model.ok_or_else(|| RagError::Config("model is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));

        Ok(RagPipeline {
            policy: RetrievalPolicy::new(embedder.clone(), store.clone(), config.clone()),
            synthesizer: AnswerSynthesizer::new(model),
            registry: DocumentRegistry::new(store.clone()),
            config,
            chunker,
            embedder,
            store,
        })
    }
}
