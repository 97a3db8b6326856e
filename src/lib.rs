//! Retrieval-augmented question answering over a user's own documents.
//!
//! Documents are split into overlapping page-tracked chunks, embedded,
//! and upserted into a vector store. A question is embedded with the
//! same provider, the top-k most similar chunks above a similarity
//! floor are retrieved, and a language model synthesizes a grounded
//! answer with per-source citations.
//!
//! # Architecture
//!
//! - [`Chunker`] / [`RecursiveChunker`] — separator-aware splitting with
//!   verbatim overlap and page attribution
//! - [`EmbeddingProvider`] — text to vector, batched
//! - [`VectorStore`] / [`InMemoryVectorStore`] — keyed upsert, cosine
//!   top-k query, deletion, document listing
//! - [`ChatModel`] / [`AnswerSynthesizer`] — one grounded prompt, one
//!   completion, `[S{n}]` citation tags
//! - [`RagPipeline`] — the orchestrator tying these together
//!
//! Remote backends are feature-gated: `openai` enables
//! [`OpenAiEmbeddingProvider`] and [`OpenAiChatModel`], `qdrant` enables
//! [`QdrantVectorStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use notebook_rag::{InMemoryVectorStore, Page, RagConfig, RagPipeline};
//! # use notebook_rag::{ChatModel, EmbeddingProvider};
//! # async fn demo(
//! #     embedder: Arc<dyn EmbeddingProvider>,
//! #     model: Arc<dyn ChatModel>,
//! # ) -> notebook_rag::Result<()> {
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder(embedder)
//!     .store(Arc::new(InMemoryVectorStore::new()))
//!     .model(model)
//!     .build()?;
//!
//! let report = pipeline
//!     .ingest("policy.pdf", &[Page::new(1, "Grading is based on ...")])
//!     .await?;
//! println!("indexed {} chunks", report.chunks_indexed);
//!
//! let result = pipeline.ask("How is the grade calculated?").await?;
//! println!("{}", result.answer.text);
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod inmemory;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod retrieval;
pub mod store;
pub mod synthesis;

mod retry;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, AskResult, Chunk, Citation, DocumentSummary, IngestReport, Page, RetrievalStats,
    ScoredChunk, chunk_key,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{PlainTextExtractor, SourceType, TextExtractor};
pub use inmemory::{InMemoryVectorStore, cosine_similarity};
pub use model::ChatModel;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use registry::DocumentRegistry;
pub use retrieval::RetrievalPolicy;
pub use store::VectorStore;
pub use synthesis::{AnswerSynthesizer, NO_CONTEXT_ANSWER};

#[cfg(feature = "openai")]
pub use openai::{OpenAiChatModel, OpenAiEmbeddingProvider};

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
