//! Data types for pages, chunks, search results, and answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single page of extracted document text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    /// Plain text extracted from the page.
    pub text: String,
}

impl Page {
    /// Create a new page.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }
}

/// The atomic retrieval unit: a span of document text with provenance
/// and an embedding vector.
///
/// Chunks are immutable once embedded; a document update is modeled as
/// delete-all-then-reinsert, never in-place mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique key, deterministic from document name and ordinal, so
    /// re-processing the same document is idempotent.
    pub key: String,
    /// Source document filename.
    pub document: String,
    /// Page containing the chunk's first character.
    pub page: u32,
    /// Last page the chunk spans, when it crosses a page boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
    /// Ordinal position within the document.
    pub ordinal: usize,
    /// The text content of the chunk.
    pub text: String,
    /// The embedding vector. Empty until the chunk has been embedded.
    pub embedding: Vec<f32>,
    /// When the chunk was produced.
    pub created_at: DateTime<Utc>,
}

/// Build the deterministic key for a chunk of `document` at `ordinal`.
pub fn chunk_key(document: &str, ordinal: usize) -> String {
    format!("{document}_chunk_{ordinal}")
}

/// A retrieved [`Chunk`] paired with its similarity score.
///
/// The chunk's `embedding` field is left empty by store queries; only
/// metadata and text travel back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk (metadata and text, no vector).
    pub chunk: Chunk,
    /// Cosine similarity to the query vector, in `[-1, 1]`.
    pub score: f32,
}

/// Provenance record attached to a synthesized answer. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Source document filename.
    pub document: String,
    /// Page number of the cited chunk.
    pub page: u32,
    /// Similarity score of the cited chunk.
    pub score: f32,
    /// Short excerpt of the cited chunk's text.
    pub excerpt: String,
}

/// One row of the document registry: everything known about a document,
/// derived on demand from its chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    /// Document filename.
    pub document: String,
    /// Number of chunks stored for this document.
    pub chunk_count: usize,
    /// Number of distinct pages covered by the chunks.
    pub page_count: usize,
    /// Sorted distinct page numbers.
    pub pages: Vec<u32>,
    /// Creation timestamp of the earliest stored chunk.
    pub first_indexed_at: Option<DateTime<Utc>>,
}

/// Outcome of ingesting one document, including partial failures.
///
/// Embedding failures are fatal to their batch only; the report says
/// how many chunks made it into the index ("12/15 chunks indexed").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Document filename.
    pub document: String,
    /// Chunks successfully embedded and upserted.
    pub chunks_indexed: usize,
    /// Chunks that failed to embed after retries.
    pub chunks_failed: usize,
    /// Ordinals of the failed chunks, for targeted retry.
    pub failed_ordinals: Vec<usize>,
}

impl IngestReport {
    /// Whether every produced chunk was indexed.
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0
    }
}

/// A synthesized answer with citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// Citations for the chunks the answer drew from, in the order the
    /// chunks were fed to the model.
    pub citations: Vec<Citation>,
    /// Keys of the chunks the model reported using.
    pub used_chunk_keys: Vec<String>,
    /// `false` when the model emitted no source tags and the citations
    /// list every provided candidate as a potential source.
    pub attribution_confirmed: bool,
}

/// Retrieval counters carried alongside an [`Answer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetrievalStats {
    /// Candidates returned by the vector query before the floor.
    pub total_retrieved: usize,
    /// Candidates at or above the similarity floor.
    pub total_relevant: usize,
    /// The floor that was applied.
    pub similarity_threshold: f32,
}

/// A complete question-answering outcome: the answer plus retrieval stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResult {
    /// The synthesized answer with citations.
    pub answer: Answer,
    /// How retrieval behaved for this question.
    pub retrieval: RetrievalStats,
}
