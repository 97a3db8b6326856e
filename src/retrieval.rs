//! Retrieval policy: top-k neighbor search with a low similarity floor.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RagConfig;
use crate::document::{RetrievalStats, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::retry::Backoff;
use crate::store::VectorStore;

/// Total attempts for a vector query. Kept deliberately small: retrying
/// reads aggressively would mask store latency problems.
const QUERY_ATTEMPTS: usize = 2;

/// Candidate chunks for a question, plus retrieval counters.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Candidates at or above the similarity floor, best first.
    pub candidates: Vec<ScoredChunk>,
    /// Counters for reporting ("retrieved 15, kept 4").
    pub stats: RetrievalStats,
}

/// Two-stage candidate selection: a generous top-k vector query followed
/// by a low similarity floor.
///
/// Chunks below the floor are discarded as noise; chunks above it are
/// *not* pruned further here. Embedding similarity is an imperfect proxy
/// for semantic relevance — a paraphrase can score lower than a topical
/// near-duplicate — so final relevance judgment is delegated to the
/// language model in [`AnswerSynthesizer`](crate::AnswerSynthesizer).
/// The policy errs toward recall at the vector stage.
#[derive(Clone)]
pub struct RetrievalPolicy {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RagConfig,
}

impl RetrievalPolicy {
    /// Create a policy over the given embedder and store.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RagConfig,
    ) -> Self {
        Self { embedder, store, config }
    }

    /// Retrieve candidate chunks for a question.
    ///
    /// Embeds the question, queries the store for `top_k` neighbors, and
    /// applies the similarity floor after retrieval.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let question_embedding = self.embedder.embed(question).await?;
        debug!(dimensions = question_embedding.len(), "question embedded");

        let mut backoff = Backoff::new(QUERY_ATTEMPTS);
        let results = loop {
            match self.store.query(&question_embedding, self.config.top_k, None).await {
                Ok(results) => break results,
                Err(e) => {
                    if !backoff.wait("query").await {
                        return Err(e);
                    }
                }
            }
        };

        let total_retrieved = results.len();
        let threshold = self.config.similarity_threshold;
        let candidates: Vec<ScoredChunk> =
            results.into_iter().filter(|r| r.score >= threshold).collect();

        info!(
            total_retrieved,
            total_relevant = candidates.len(),
            similarity_threshold = threshold,
            "retrieval completed"
        );

        Ok(Retrieval {
            stats: RetrievalStats {
                total_retrieved,
                total_relevant: candidates.len(),
                similarity_threshold: threshold,
            },
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::document::{Chunk, chunk_key};
    use crate::inmemory::InMemoryVectorStore;

    /// Embeds every text to a fixed unit vector; similarity to stored
    /// chunks is then controlled entirely by the chunk vectors below.
    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn chunk_with_similarity(ordinal: usize, similarity: f32) -> Chunk {
        // cos(theta) against [1, 0] equals the x component of a unit vector.
        let y = (1.0 - similarity * similarity).max(0.0).sqrt();
        Chunk {
            key: chunk_key("doc.pdf", ordinal),
            document: "doc.pdf".to_string(),
            page: 1,
            page_end: None,
            ordinal,
            text: format!("chunk {ordinal}"),
            embedding: vec![similarity, y],
            created_at: Utc::now(),
        }
    }

    async fn policy_with(chunks: Vec<Chunk>, threshold: f32) -> RetrievalPolicy {
        let store = Arc::new(InMemoryVectorStore::new());
        store.upsert(&chunks).await.unwrap();
        let config = RagConfig::builder()
            .similarity_threshold(threshold)
            .top_k(15)
            .build()
            .unwrap();
        RetrievalPolicy::new(Arc::new(FixedEmbedder), store, config)
    }

    #[tokio::test]
    async fn floor_keeps_marginal_candidates_above_threshold() {
        // A 0.42-similarity chunk survives a 0.3 floor: the language
        // model, not the floor, makes the final relevance call.
        let policy = policy_with(
            vec![chunk_with_similarity(0, 0.42), chunk_with_similarity(1, 0.1)],
            0.3,
        )
        .await;

        let retrieval = policy.retrieve("How is the score calculated?").await.unwrap();
        assert_eq!(retrieval.stats.total_retrieved, 2);
        assert_eq!(retrieval.stats.total_relevant, 1);
        assert_eq!(retrieval.candidates.len(), 1);
        assert_eq!(retrieval.candidates[0].chunk.ordinal, 0);
        assert!((retrieval.candidates[0].score - 0.42).abs() < 1e-3);
    }

    #[tokio::test]
    async fn all_below_floor_yields_empty_candidates() {
        let policy = policy_with(
            vec![chunk_with_similarity(0, 0.2), chunk_with_similarity(1, 0.05)],
            0.3,
        )
        .await;

        let retrieval = policy.retrieve("unrelated question").await.unwrap();
        assert!(retrieval.candidates.is_empty());
        assert_eq!(retrieval.stats.total_retrieved, 2);
        assert_eq!(retrieval.stats.total_relevant, 0);
    }

    #[tokio::test]
    async fn candidates_are_capped_at_top_k() {
        let chunks: Vec<Chunk> = (0..30).map(|i| chunk_with_similarity(i, 0.9)).collect();
        let policy = policy_with(chunks, 0.0).await;

        let retrieval = policy.retrieve("anything").await.unwrap();
        assert_eq!(retrieval.candidates.len(), 15);
    }
}
